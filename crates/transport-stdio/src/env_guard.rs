/// Environment variable names a subprocess spawn config must never be
/// allowed to override, since doing so could redirect the gateway's own
/// library search path, shell, or credential agent into the child.
pub fn is_dangerous_env_var(name: &str) -> bool {
    const BLOCKED: &[&str] = &[
        "LD_PRELOAD", "LD_LIBRARY_PATH", "LD_AUDIT",
        "DYLD_INSERT_LIBRARIES", "DYLD_LIBRARY_PATH", "DYLD_FRAMEWORK_PATH",
        "PATH", "HOME", "USER", "SHELL",
        "SSH_AUTH_SOCK", "SSH_AGENT_PID",
        "PYTHONPATH", "PYTHONSTARTUP", "PYTHONHOME",
        "NODE_PATH", "NODE_OPTIONS",
        "BASH_ENV", "ENV", "CDPATH", "IFS",
    ];
    BLOCKED.contains(&name.to_ascii_uppercase().as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blocks_ld_preload_case_insensitively() {
        assert!(is_dangerous_env_var("ld_preload"));
        assert!(is_dangerous_env_var("LD_PRELOAD"));
    }

    #[test]
    fn allows_ordinary_variable() {
        assert!(!is_dangerous_env_var("MY_SERVER_TOKEN"));
    }
}
