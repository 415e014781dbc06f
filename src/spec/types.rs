//! Named value formats that argument metadata can ask for with `type:`.

use once_cell::sync::Lazy;
use regex::Regex;
use std::path::Path;

use super::{ArgKind, ArgValue};

static FQDN_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"\A(([a-zA-Z0-9]|[a-zA-Z0-9][a-zA-Z0-9\-]*[a-zA-Z0-9])\.)*([A-Za-z0-9]|[A-Za-z0-9][A-Za-z0-9\-]*[A-Za-z0-9])\z",
    )
    .unwrap()
});

static HTTP_URL_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)\Ahttps?://.*\z").unwrap());

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    /// `true`/`false`/`1`/`0`
    Boolean,
    AbsolutePath,
    /// An existing regular file.
    File,
    /// TCP/UDP port.
    Port,
    Fqdn,
    HttpUrl,
}

impl Format {
    pub fn parse(name: &str) -> Option<Format> {
        match name {
            "Boolean" => Some(Format::Boolean),
            "AbsolutePath" => Some(Format::AbsolutePath),
            "File" => Some(Format::File),
            "Port" => Some(Format::Port),
            "FQDN" => Some(Format::Fqdn),
            "HTTPUrl" => Some(Format::HttpUrl),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Format::Boolean => "Boolean",
            Format::AbsolutePath => "AbsolutePath",
            Format::File => "File",
            Format::Port => "Port",
            Format::Fqdn => "FQDN",
            Format::HttpUrl => "HTTPUrl",
        }
    }

    /// The argument kind values of this format have.
    pub fn kind(&self) -> ArgKind {
        match self {
            Format::Boolean => ArgKind::Bool,
            Format::Port => ArgKind::Int,
            _ => ArgKind::String,
        }
    }

    /// Whether an argument of `kind` may use this format.
    pub fn fits(&self, kind: ArgKind) -> bool {
        match self.kind() {
            ArgKind::String => matches!(kind, ArgKind::String | ArgKind::List),
            own => own == kind,
        }
    }

    /// Check a raw command-line value and convert it.
    pub fn validate(&self, token: &str) -> Result<ArgValue, String> {
        match self {
            Format::Boolean => match token.to_lowercase().as_str() {
                "true" | "1" => Ok(ArgValue::Bool(true)),
                "false" | "0" => Ok(ArgValue::Bool(false)),
                _ => Err("expected one of true, false, 1, 0".to_string()),
            },
            Format::AbsolutePath => {
                if Path::new(token).is_absolute() {
                    Ok(ArgValue::Str(token.to_string()))
                } else {
                    Err("not an absolute path".to_string())
                }
            }
            Format::File => {
                if Path::new(token).is_file() {
                    Ok(ArgValue::Str(token.to_string()))
                } else {
                    Err("no such file".to_string())
                }
            }
            Format::Port => {
                let port: i64 = token.parse().map_err(|e| format!("{}", e))?;
                if 0 < port && port < 65535 {
                    Ok(ArgValue::Int(port))
                } else {
                    Err("port out of range".to_string())
                }
            }
            Format::Fqdn => {
                if FQDN_RE.is_match(token) {
                    Ok(ArgValue::Str(token.to_string()))
                } else {
                    Err("not a fully qualified domain name".to_string())
                }
            }
            Format::HttpUrl => {
                if HTTP_URL_RE.is_match(token) {
                    Ok(ArgValue::Str(token.to_string()))
                } else {
                    Err("not an http(s) URL".to_string())
                }
            }
        }
    }
}
