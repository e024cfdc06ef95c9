//! Publishes over secure shell by running the system `ssh` client in batch
//! mode, so it fails instead of prompting for a password. Directories are
//! created with `mkdir -p` and files are streamed into `cat` on the remote
//! host, so every remote path goes through the same quoting whatever scp
//! protocol the server speaks.

use super::{Error, Result, Transport};
use crate::config::Remote;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

/// Messages OpenSSH prints when the server rejects the credentials. They
/// come from the client itself, unlike a remote command's own `Permission
/// denied` (e.g. `mkdir: cannot create directory '/srv': Permission denied`)
/// which affects a single operation.
const AUTH_FAILURES: &[&str] = &[
    "Permission denied (",
    "Too many authentication failures",
    "Authentication failed.",
];

pub struct ScpTransport {
    remote: Remote,
    ssh: Option<PathBuf>,
}

impl ScpTransport {
    pub fn new(remote: Remote) -> ScpTransport {
        ScpTransport { remote, ssh: None }
    }

    fn destination(&self) -> String {
        match &self.remote.user {
            Some(user) => format!("{}@{}", user, self.remote.host),
            None => self.remote.host.clone(),
        }
    }

    /// Builds an `ssh` invocation that runs `script` on the remote host.
    fn remote_command(&self, script: &str) -> Result<Command> {
        let ssh = self.ssh.as_ref().ok_or_else(|| {
            Error::Transfer(String::from("transport is not open"))
        })?;
        let mut cmd = Command::new(ssh);
        cmd.arg("-o")
            .arg("BatchMode=yes")
            .arg("-p")
            .arg(self.remote.port.to_string());
        if let Some(identity) = &self.remote.identity_file {
            cmd.arg("-i").arg(identity);
        }
        cmd.arg(self.destination()).arg(script);
        Ok(cmd)
    }

    /// Builds the `ssh` invocation that streams `local` into `remote`.
    fn put_command(&self, local: &Path, remote: &str) -> Result<Command> {
        let script = format!("cat > {}", shell_quote(remote));
        let mut cmd = self.remote_command(&script)?;
        cmd.stdin(Stdio::from(File::open(local)?));
        Ok(cmd)
    }
}

/// Runs `cmd`, mapping a failed exit into an [`Error`] based on its stderr.
fn run(mut cmd: Command) -> Result<()> {
    log::debug!("running {:?}", cmd);
    let output = cmd.output()?;
    if output.status.success() {
        return Ok(());
    }
    let stderr = String::from_utf8_lossy(&output.stderr).trim().to_owned();
    let message = match stderr.is_empty() {
        true => format!("exited with {}", output.status),
        false => stderr,
    };
    Err(classify(message))
}

fn classify(message: String) -> Error {
    if AUTH_FAILURES.iter().any(|needle| message.contains(needle)) {
        Error::Auth(message)
    } else {
        Error::Transfer(message)
    }
}

/// Quotes `s` for the remote POSIX shell that runs `ssh` commands.
fn shell_quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', r"'\''"))
}

impl Transport for ScpTransport {
    fn open(&mut self) -> Result<()> {
        self.ssh = Some(which::which("ssh").map_err(|e| {
            Error::Transfer(format!("`ssh` not found: {}", e))
        })?);

        // A no-op command surfaces rejected credentials before any upload.
        run(self.remote_command("true")?)
    }

    fn mkdir(&mut self, remote_dir: &str) -> Result<()> {
        let script = format!("mkdir -p {}", shell_quote(remote_dir));
        run(self.remote_command(&script)?)
    }

    fn put(&mut self, local: &Path, remote: &str) -> Result<()> {
        run(self.put_command(local, remote)?)
    }

    fn close(&mut self) -> Result<()> {
        self.ssh = None;
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::config::TransportKind;

    fn remote(user: Option<&str>) -> Remote {
        Remote {
            transport: TransportKind::Scp,
            host: String::from("example.org"),
            port: 2222,
            user: user.map(str::to_owned),
            password: None,
            identity_file: Some(PathBuf::from("/keys/id")),
            destination: String::from("/srv/www"),
        }
    }

    fn opened(user: Option<&str>) -> ScpTransport {
        let mut transport = ScpTransport::new(remote(user));
        transport.ssh = Some(PathBuf::from("/usr/bin/ssh"));
        transport
    }

    fn args(cmd: &Command) -> Vec<String> {
        cmd.get_args()
            .map(|a| a.to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn test_rejected_credentials_are_auth() {
        for stderr in &[
            "alice@example.org: Permission denied (publickey,password).",
            "Received disconnect from 10.0.0.1 port 22:2: Too many authentication failures",
        ] {
            assert!(classify(stderr.to_string()).is_auth(), "{}", stderr);
        }
    }

    #[test]
    fn test_remote_permission_errors_are_transfer() {
        for stderr in &[
            "scp: /srv/www/a.html: Permission denied",
            "mkdir: cannot create directory '/srv/www/tags': Permission denied",
            "sh: 1: cannot create /srv/www/a.html: Permission denied",
            "ssh: connect to host example.org port 22: Connection refused",
        ] {
            assert!(!classify(stderr.to_string()).is_auth(), "{}", stderr);
        }
    }

    #[test]
    fn test_shell_quote() {
        assert_eq!("'/srv/it'\\''s'", shell_quote("/srv/it's"));
    }

    #[test]
    fn test_destination() {
        assert_eq!("alice@example.org", opened(Some("alice")).destination());
        assert_eq!("example.org", opened(None).destination());
    }

    #[test]
    fn test_remote_command_args() {
        let cmd = opened(None).remote_command("true").unwrap();
        assert_eq!(
            vec![
                "-o",
                "BatchMode=yes",
                "-p",
                "2222",
                "-i",
                "/keys/id",
                "example.org",
                "true"
            ],
            args(&cmd)
        );
    }

    #[test]
    fn test_put_quotes_remote_path() -> std::io::Result<()> {
        let dir = tempfile::TempDir::new()?;
        let local = dir.path().join("my page.html");
        std::fs::write(&local, "page")?;

        let cmd = opened(None)
            .put_command(&local, "/srv/www/my page (1).html")
            .unwrap();
        assert_eq!(
            Some(&String::from("cat > '/srv/www/my page (1).html'")),
            args(&cmd).last()
        );
        Ok(())
    }

    #[test]
    fn test_put_before_open_fails() {
        let mut transport = ScpTransport::new(remote(None));
        assert!(matches!(
            transport.put(Path::new("a.html"), "/srv/www/a.html"),
            Err(Error::Transfer(_))
        ));
    }
}
