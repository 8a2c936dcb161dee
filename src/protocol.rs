//! Wire protocol types: FTP commands (RFC 959) plus the `RGTR`/`TAG`
//! extensions and the `555`/`556` reply codes.

use std::fmt;

/// A parsed control-channel command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    User(String),
    Pass(String),
    /// Registration extension: `RGTR <username>`.
    Rgtr(String),
    /// Post-upload tag submission: `TAG <hex-tag>`.
    Tag(String),
    Stor(String),
    Retr(String),
    Dele(String),
    Rmd(String),
    Mkd(String),
    Cwd(String),
    Pwd,
    List(Option<String>),
    Nlst(Option<String>),
    Rnfr(String),
    Rnto(String),
    Size(String),
    Quit,
    /// Anything not recognized; carries the verb as received.
    Unknown(String),
}

impl Command {
    /// Parses one CRLF-stripped control line.
    pub fn parse(line: &str) -> Self {
        let line = line.trim_end_matches(['\r', '\n']);
        let (verb, rest) = match line.split_once(' ') {
            Some((v, r)) => (v, r.to_string()),
            None => (line, String::new()),
        };
        match verb.to_ascii_uppercase().as_str() {
            "USER" => Command::User(rest),
            "PASS" => Command::Pass(rest),
            "RGTR" => Command::Rgtr(rest),
            "TAG" => Command::Tag(rest),
            "STOR" => Command::Stor(rest),
            "RETR" => Command::Retr(rest),
            "DELE" => Command::Dele(rest),
            "RMD" => Command::Rmd(rest),
            "MKD" => Command::Mkd(rest),
            "CWD" => Command::Cwd(rest),
            "PWD" => Command::Pwd,
            "LIST" => Command::List(if rest.is_empty() { None } else { Some(rest) }),
            "NLST" => Command::Nlst(if rest.is_empty() { None } else { Some(rest) }),
            "RNFR" => Command::Rnfr(rest),
            "RNTO" => Command::Rnto(rest),
            "SIZE" => Command::Size(rest),
            "QUIT" => Command::Quit,
            _ => Command::Unknown(verb.to_string()),
        }
    }
}

/// A reply line: a three-digit code and a human-readable message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub code: u16,
    pub message: String,
}

impl Reply {
    pub fn new(code: u16, message: impl Into<String>) -> Self {
        Self { code, message: message.into() }
    }

    /// True for 2xx and 3xx codes: the request succeeded or is in progress.
    pub fn is_positive(&self) -> bool {
        matches!(self.code / 100, 1 | 2 | 3)
    }
}

impl fmt::Display for Reply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}\r\n", self.code, self.message)
    }
}

impl Reply {
    /// Parses a single reply line of the form `CODE message`.
    pub fn parse(line: &str) -> Option<Self> {
        let line = line.trim_end_matches(['\r', '\n']);
        let (code_str, message) = line.split_once(' ')?;
        let code = code_str.parse().ok()?;
        Some(Self { code, message: message.to_string() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_extension_commands() {
        assert_eq!(Command::parse("RGTR rawn\r\n"), Command::Rgtr("rawn".to_string()));
        assert_eq!(Command::parse("TAG deadbeef\r\n"), Command::Tag("deadbeef".to_string()));
    }

    #[test]
    fn parses_bare_commands() {
        assert_eq!(Command::parse("PWD\r\n"), Command::Pwd);
        assert_eq!(Command::parse("QUIT"), Command::Quit);
    }

    #[test]
    fn reply_round_trips_through_display_and_parse() {
        let r = Reply::new(556, "altered: a.txt");
        let rendered = r.to_string();
        let parsed = Reply::parse(rendered.trim_end()).unwrap();
        assert_eq!(parsed, r);
    }

    #[test]
    fn positive_reply_classification() {
        assert!(Reply::new(230, "ok").is_positive());
        assert!(!Reply::new(530, "no").is_positive());
    }
}
