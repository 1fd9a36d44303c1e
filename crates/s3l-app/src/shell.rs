// ============================================
// File: crates/s3l-app/src/shell.rs
// ============================================
//! # Interactive Shell
//!
//! ## Creation Reason
//! The line-oriented command loop behind `s3l-client`. Input and output
//! are generic so the loop can be driven from tests.
//!
//! ## Commands
//! ```text
//! upload <file>        download <file>      delete <file>
//! list                 rename <old> <new>   logout
//! help
//! ```
//!
//! ## Last Modified
//! v0.1.0 - Initial command set

use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};

use tracing::warn;

use s3l_transport::ByteChannel;

use crate::client::FileClient;
use crate::error::{AppError, Result};

/// Prompt printed before each command.
pub const PROMPT: &str = ">>> ";

/// One parsed input line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// `upload <file>`
    Upload(PathBuf),
    /// `download <file>`
    Download(String),
    /// `delete <file>`, confirmed interactively
    Delete(String),
    /// `list`
    List,
    /// `rename <old> <new>`
    Rename(String, String),
    /// `logout`
    Logout,
    /// `help`
    Help,
}

impl Command {
    const NAMES: [&'static str; 7] = ["upload", "download", "delete", "list", "rename", "logout", "help"];

    /// Parses a line of user input.
    ///
    /// # Errors
    /// `InvalidCommand` for unknown commands or a wrong argument count.
    pub fn parse(line: &str) -> Result<Self> {
        let mut words = line.split_whitespace();
        let Some(name) = words.next() else {
            return Err(AppError::invalid_command("empty line"));
        };
        let args: Vec<&str> = words.collect();
        let arity = match name {
            "upload" | "download" | "delete" => 1,
            "rename" => 2,
            "list" | "logout" | "help" => 0,
            other => return Err(AppError::invalid_command(format!("unknown command '{other}'"))),
        };
        if args.len() != arity {
            return Err(AppError::invalid_command(format!(
                "'{name}' takes {arity} argument(s), got {}",
                args.len()
            )));
        }

        Ok(match name {
            "upload" => Self::Upload(PathBuf::from(args[0])),
            "download" => Self::Download(args[0].to_string()),
            "delete" => Self::Delete(args[0].to_string()),
            "rename" => Self::Rename(args[0].to_string(), args[1].to_string()),
            "list" => Self::List,
            "logout" => Self::Logout,
            _ => Self::Help,
        })
    }

    /// The command list shown by `help`.
    #[must_use]
    pub fn usage() -> String {
        Self::NAMES.join("  ")
    }
}

/// Runs the command loop until `logout`, end of input, or a session-ending
/// error.
///
/// Downloads land in `download_dir`.
///
/// # Errors
/// Terminal I/O failures and errors that end the session. Refused
/// requests and bad commands are printed and the loop continues.
pub fn run<C, R, W>(
    mut client: FileClient<C>,
    input: &mut R,
    output: &mut W,
    download_dir: &Path,
) -> Result<()>
where
    C: ByteChannel,
    AppError: From<C::Error>,
    R: BufRead,
    W: Write,
{
    let term = |e| AppError::io("writing to the terminal", e);
    writeln!(output, "{}", Command::usage()).map_err(term)?;

    loop {
        let Some(line) = prompt(input, output)? else {
            writeln!(output, "\nexiting...").map_err(term)?;
            break;
        };
        if line.trim().is_empty() {
            continue;
        }

        let command = match Command::parse(&line) {
            Ok(command) => command,
            Err(e) => {
                writeln!(output, "{e}").map_err(term)?;
                continue;
            }
        };
        if command == Command::Logout {
            writeln!(output, "exiting...").map_err(term)?;
            break;
        }

        match execute(&mut client, command, input, output, download_dir) {
            Ok(()) => {}
            Err(e) if e.is_recoverable() => writeln!(output, "{e}").map_err(term)?,
            Err(e) => {
                warn!(error = %e, "Session ended");
                return Err(e);
            }
        }
    }

    client.logout();
    Ok(())
}

fn execute<C, R, W>(
    client: &mut FileClient<C>,
    command: Command,
    input: &mut R,
    output: &mut W,
    download_dir: &Path,
) -> Result<()>
where
    C: ByteChannel,
    AppError: From<C::Error>,
    R: BufRead,
    W: Write,
{
    let term = |e| AppError::io("writing to the terminal", e);
    match command {
        Command::Upload(path) => {
            let size = client.upload(&path)?;
            writeln!(output, "uploaded {size} bytes").map_err(term)?;
        }
        Command::Download(name) => {
            let size = client.download(&name, download_dir)?;
            writeln!(output, "downloaded {size} bytes").map_err(term)?;
        }
        Command::Delete(name) => {
            let nonce = client.request_delete(&name)?;
            writeln!(output, "Do you confirm? [y/n]").map_err(term)?;
            let answer = prompt(input, output)?.unwrap_or_default();
            let status = client.confirm_delete(&nonce, answer.trim() == "y")?;
            if !status.is_empty() {
                writeln!(output, "{status}").map_err(term)?;
            }
        }
        Command::List => {
            writeln!(output, "{}", client.list()?.join("  ")).map_err(term)?;
        }
        Command::Rename(old, new) => {
            let status = client.rename(&old, &new)?;
            writeln!(output, "{status}").map_err(term)?;
        }
        Command::Help => writeln!(output, "{}", Command::usage()).map_err(term)?,
        Command::Logout => {}
    }
    Ok(())
}

/// Prints the prompt and reads one line; `None` at end of input.
fn prompt<R: BufRead, W: Write>(input: &mut R, output: &mut W) -> Result<Option<String>> {
    write!(output, "{PROMPT}")
        .and_then(|()| output.flush())
        .map_err(|e| AppError::io("writing to the terminal", e))?;
    let mut line = String::new();
    let n = input
        .read_line(&mut line)
        .map_err(|e| AppError::io("reading from the terminal", e))?;
    Ok((n > 0).then(|| line.trim_end_matches(['\r', '\n']).to_string()))
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;
    use std::thread;

    use s3l_common::ClientId;
    use s3l_core::IdentityKeyPair;
    use s3l_transport::local_pair;

    use super::*;
    use crate::controller::Controller;
    use crate::directory::{User, UserRecord};

    #[test]
    fn test_parse_commands() {
        assert_eq!(Command::parse("upload a.txt").unwrap(), Command::Upload("a.txt".into()));
        assert_eq!(Command::parse("  list ").unwrap(), Command::List);
        assert_eq!(
            Command::parse("rename a b").unwrap(),
            Command::Rename("a".into(), "b".into())
        );
        assert_eq!(Command::parse("help").unwrap(), Command::Help);
        assert_eq!(Command::parse("logout").unwrap(), Command::Logout);
    }

    #[test]
    fn test_parse_errors() {
        for line in ["", "fly away", "upload", "list now", "rename a", "delete a b"] {
            assert!(
                matches!(Command::parse(line), Err(AppError::InvalidCommand { .. })),
                "{line:?} should not parse"
            );
        }
    }

    #[test]
    fn test_usage_lists_every_command() {
        let usage = Command::usage();
        for name in ["upload", "download", "delete", "list", "rename", "logout", "help"] {
            assert!(usage.contains(name));
        }
    }

    #[test]
    fn test_session_script() {
        let remote = tempfile::tempdir().unwrap();
        let downloads = tempfile::tempdir().unwrap();
        std::fs::write(remote.path().join("notes.txt"), b"remember the milk").unwrap();

        let (server_end, client_end) = local_pair();
        let user = User {
            record: UserRecord {
                id: ClientId::new(1),
                name: "alice".into(),
                base_path: remote.path().to_path_buf(),
                public_key_path: "alice.pub".into(),
            },
            key: IdentityKeyPair::generate().public_key(),
        };
        let handle = thread::spawn(move || Controller::new(server_end, user).serve());

        let script = "list\nbogus\ndownload notes.txt\nrename notes.txt todo.txt\ndelete todo.txt\ny\nlist\nlogout\n";
        let mut input = Cursor::new(script.as_bytes());
        let mut output = Vec::new();
        run(FileClient::new(client_end), &mut input, &mut output, downloads.path()).unwrap();
        handle.join().unwrap().unwrap();

        let transcript = String::from_utf8(output).unwrap();
        assert!(transcript.contains("notes.txt\n"));
        assert!(transcript.contains("unknown command 'bogus'"));
        assert!(transcript.contains("downloaded 17 bytes"));
        assert!(transcript.contains("file renamed"));
        assert!(transcript.contains("Do you confirm? [y/n]"));
        assert!(transcript.contains("file deleted"));
        assert!(transcript.ends_with("exiting...\n"));
        assert_eq!(
            std::fs::read(downloads.path().join("notes.txt")).unwrap(),
            b"remember the milk"
        );
        assert!(!remote.path().join("todo.txt").exists());
    }

    #[test]
    fn test_end_of_input_logs_out() {
        let remote = tempfile::tempdir().unwrap();
        let (server_end, client_end) = local_pair();
        let user = User {
            record: UserRecord {
                id: ClientId::new(2),
                name: "bob".into(),
                base_path: remote.path().to_path_buf(),
                public_key_path: "bob.pub".into(),
            },
            key: IdentityKeyPair::generate().public_key(),
        };
        let handle = thread::spawn(move || Controller::new(server_end, user).serve());

        let mut input = Cursor::new(&b"upload /nonexistent/file\n"[..]);
        let mut output = Vec::new();
        run(FileClient::new(client_end), &mut input, &mut output, remote.path()).unwrap();
        handle.join().unwrap().unwrap();

        let transcript = String::from_utf8(output).unwrap();
        assert!(transcript.contains("exiting..."));
    }
}
