use std::fmt;
use std::str::FromStr;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::farcaster::{Hash, HashError};

static TARGET_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:@(?P<fname>[a-z0-9][a-z0-9.\-]{0,63})|fid:(?P<fid>[0-9]{1,20}))/(?P<rest>.+)$")
        .expect("valid target regex")
});

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum TargetError {
    #[error("target must look like @fname/casts, @fname/0x<hash> or fid:<n>/casts, got {0:?}")]
    Malformed(String),
    #[error("fid out of range in {0:?}")]
    InvalidFid(String),
    #[error("bad cast hash in {target:?}")]
    InvalidHash {
        target: String,
        #[source]
        source: HashError,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum User {
    Fname(String),
    Fid(u64),
}

impl fmt::Display for User {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            User::Fname(name) => write!(f, "@{name}"),
            User::Fid(fid) => write!(f, "fid:{fid}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    Casts(User),
    Cast(User, Hash),
}

impl Target {
    pub fn user(&self) -> &User {
        match self {
            Target::Casts(user) | Target::Cast(user, _) => user,
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Target::Casts(user) => write!(f, "{user}/casts"),
            Target::Cast(user, hash) => write!(f, "{user}/{hash}"),
        }
    }
}

impl FromStr for Target {
    type Err = TargetError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let trimmed = raw.trim();
        let caps = TARGET_RE
            .captures(trimmed)
            .ok_or_else(|| TargetError::Malformed(raw.to_string()))?;

        let user = match (caps.name("fname"), caps.name("fid")) {
            (Some(fname), _) => User::Fname(fname.as_str().to_string()),
            (None, Some(fid)) => User::Fid(
                fid.as_str()
                    .parse()
                    .map_err(|_| TargetError::InvalidFid(raw.to_string()))?,
            ),
            (None, None) => return Err(TargetError::Malformed(raw.to_string())),
        };

        let rest = caps.name("rest").map(|m| m.as_str()).unwrap_or_default();
        if rest == "casts" {
            return Ok(Target::Casts(user));
        }
        if !rest.starts_with("0x") && !rest.starts_with("0X") {
            return Err(TargetError::Malformed(raw.to_string()));
        }
        let hash = rest.parse::<Hash>().map_err(|source| TargetError::InvalidHash {
            target: raw.to_string(),
            source,
        })?;
        Ok(Target::Cast(user, hash))
    }
}
