//! Command type for building executable commands

use async_process::Command as AsyncCommand;
use std::collections::HashMap;
use std::ffi::{OsStr, OsString};
use std::fmt;
use std::path::{Path, PathBuf};

/// A command to be executed
///
/// Unlike `async_process::Command`, this type is `Clone` and can be inspected,
/// which lets wrapping launchers (SSH, sudo) rewrite it before it is spawned.
#[derive(Debug, Clone)]
pub struct Command {
    program: OsString,
    args: Vec<OsString>,
    env: HashMap<OsString, OsString>,
    current_dir: Option<PathBuf>,
}

impl Command {
    /// Create a new command for the given program
    pub fn new<S: AsRef<OsStr>>(program: S) -> Self {
        Self {
            program: program.as_ref().to_owned(),
            args: Vec::new(),
            env: HashMap::new(),
            current_dir: None,
        }
    }

    /// Create a command that runs `script` through `sh -c`
    ///
    /// Pipelines and redirections inside `script` are interpreted by the shell
    /// wherever the command ends up running.
    pub fn shell(script: impl AsRef<OsStr>) -> Self {
        let mut cmd = Self::new("sh");
        cmd.arg("-c").arg(script);
        cmd
    }

    /// Add an argument to the command
    pub fn arg<S: AsRef<OsStr>>(&mut self, arg: S) -> &mut Self {
        self.args.push(arg.as_ref().to_owned());
        self
    }

    /// Add multiple arguments to the command
    pub fn args<I, S>(&mut self, args: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        for arg in args {
            self.arg(arg);
        }
        self
    }

    /// Set an environment variable
    pub fn env<K, V>(&mut self, key: K, val: V) -> &mut Self
    where
        K: AsRef<OsStr>,
        V: AsRef<OsStr>,
    {
        self.env
            .insert(key.as_ref().to_owned(), val.as_ref().to_owned());
        self
    }

    /// Set the working directory for the command
    pub fn current_dir<P: AsRef<Path>>(&mut self, dir: P) -> &mut Self {
        self.current_dir = Some(dir.as_ref().to_owned());
        self
    }

    /// Get the program name
    pub fn get_program(&self) -> &OsStr {
        &self.program
    }

    /// Get the arguments
    pub fn get_args(&self) -> &[OsString] {
        &self.args
    }

    /// Get the environment variables
    pub fn get_envs(&self) -> &HashMap<OsString, OsString> {
        &self.env
    }

    /// Get the current directory
    pub fn get_current_dir(&self) -> Option<&Path> {
        self.current_dir.as_deref()
    }

    /// Render the program and arguments as a single shell-safe string
    ///
    /// Used when the command has to cross a boundary that only carries a
    /// command line, such as the remote side of an SSH session.
    pub fn to_shell_string(&self) -> String {
        let mut parts = Vec::with_capacity(self.args.len() + 1);
        parts.push(shell_escape(&self.program.to_string_lossy()));
        parts.extend(
            self.args
                .iter()
                .map(|arg| shell_escape(&arg.to_string_lossy())),
        );
        parts.join(" ")
    }

    /// Prepare this command for execution by converting to an `async_process::Command`
    pub fn prepare(&self) -> AsyncCommand {
        let mut cmd = AsyncCommand::new(&self.program);
        cmd.args(&self.args);
        for (key, val) in &self.env {
            cmd.env(key, val);
        }
        if let Some(dir) = &self.current_dir {
            cmd.current_dir(dir);
        }
        cmd
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_shell_string())
    }
}

/// Escape a string for safe inclusion in a POSIX shell command line
pub fn shell_escape(s: &str) -> String {
    if s.is_empty() {
        return "''".to_string();
    }
    if s.contains(|c: char| c.is_whitespace() || "\"'\\$`!*?<>|&;()[]{}#~".contains(c)) {
        // Single quotes, with embedded single quotes closed, escaped and reopened
        format!("'{}'", s.replace('\'', "'\"'\"'"))
    } else {
        s.to_string()
    }
}

/// Builder pattern helper
impl Command {
    /// Create a builder for this command (for chaining)
    pub fn builder<S: AsRef<OsStr>>(program: S) -> CommandBuilder {
        CommandBuilder(Command::new(program))
    }
}

/// Builder wrapper for more ergonomic command construction
pub struct CommandBuilder(Command);

impl CommandBuilder {
    /// Add an argument
    pub fn arg<S: AsRef<OsStr>>(mut self, arg: S) -> Self {
        self.0.arg(arg);
        self
    }

    /// Add multiple arguments
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.0.args(args);
        self
    }

    /// Set an environment variable
    pub fn env<K, V>(mut self, key: K, val: V) -> Self
    where
        K: AsRef<OsStr>,
        V: AsRef<OsStr>,
    {
        self.0.env(key, val);
        self
    }

    /// Set the working directory
    pub fn current_dir<P: AsRef<Path>>(mut self, dir: P) -> Self {
        self.0.current_dir(dir);
        self
    }

    /// Build the command
    pub fn build(self) -> Command {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_builder() {
        let cmd = Command::builder("dpkg")
            .arg("-i")
            .arg("mender-client_2.1.0-1_armhf.deb")
            .env("DEBIAN_FRONTEND", "noninteractive")
            .current_dir("/tmp")
            .build();

        assert_eq!(cmd.get_program(), "dpkg");
        assert_eq!(cmd.get_args().len(), 2);
        assert_eq!(
            cmd.get_envs().get(OsStr::new("DEBIAN_FRONTEND")),
            Some(&OsString::from("noninteractive"))
        );
        assert_eq!(cmd.get_current_dir(), Some(Path::new("/tmp")));
    }

    #[test]
    fn test_shell_command() {
        let cmd = Command::shell("uname -m");
        assert_eq!(cmd.get_program(), "sh");
        assert_eq!(cmd.get_args(), &[OsString::from("-c"), OsString::from("uname -m")]);
    }

    #[test]
    fn test_shell_escape() {
        assert_eq!(shell_escape("simple"), "simple");
        assert_eq!(shell_escape(""), "''");
        assert_eq!(shell_escape("with space"), "'with space'");
        assert_eq!(shell_escape("with'quote"), "'with'\"'\"'quote'");
        assert_eq!(shell_escape("$variable"), "'$variable'");
        assert_eq!(shell_escape("/usr/bin/mender"), "/usr/bin/mender");
    }

    #[test]
    fn test_to_shell_string_quotes_pipelines() {
        let script = "echo device_type=generic-x86_64 | sudo tee /var/lib/mender/device_type";
        let cmd = Command::shell(script);
        assert_eq!(
            cmd.to_shell_string(),
            "sh -c 'echo device_type=generic-x86_64 | sudo tee /var/lib/mender/device_type'"
        );
    }
}
