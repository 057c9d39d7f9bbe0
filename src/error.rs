use crate::switch::SwitchId;
use ipnet::Ipv4Net;
use std::io;
use std::net::Ipv4Addr;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("config error: {0}")]
    Config(String),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("invalid packet: {0}")]
    InvalidPacket(String),

    #[error("no known host owns {0}")]
    HostNotFound(Ipv4Addr),

    #[error("no route matches {0}")]
    RouteNotFound(Ipv4Addr),

    #[error("no gateway configured for nexthop {nexthop} (prefix {prefix})")]
    GatewayNotFound { prefix: Ipv4Net, nexthop: Ipv4Addr },

    #[error("switch {dst} is not reachable from {src}")]
    NotReachable { src: SwitchId, dst: SwitchId },

    #[error("invalid path: {0}")]
    InvalidPath(String),

    #[error("path partially installed ({installed}/{total} flows), failed at switch {switch}: {source}")]
    PartialInstall {
        installed: usize,
        total: usize,
        switch: SwitchId,
        #[source]
        source: Box<Error>,
    },

    #[error("switch {0} is not connected")]
    SwitchUnavailable(SwitchId),

    #[error("no such neighbor: {0}")]
    NeighborNotFound(Ipv4Addr),

    #[error("event queue is full")]
    QueueFull,

    #[error("event queue is closed")]
    QueueClosed,
}

/// Coarse classification of decision failures.
///
/// Every variant degrades to "no action taken" for the packet that caused it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// No host, route or gateway was found for the destination.
    Unresolvable,
    /// The topology has no path between the two switches.
    Unreachable,
    /// Some switches of a path were programmed before a failure.
    PartialInstall,
    /// The packet or event carried unexpected fields.
    MalformedInput,
    /// Anything else (I/O, config, queue).
    Internal,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::HostNotFound(_)
            | Error::RouteNotFound(_)
            | Error::GatewayNotFound { .. }
            | Error::NeighborNotFound(_) => ErrorKind::Unresolvable,
            Error::NotReachable { .. } | Error::SwitchUnavailable(_) => ErrorKind::Unreachable,
            Error::PartialInstall { .. } => ErrorKind::PartialInstall,
            Error::Parse(_) | Error::InvalidPacket(_) | Error::InvalidPath(_) => {
                ErrorKind::MalformedInput
            }
            Error::Io(_) | Error::Config(_) | Error::QueueFull | Error::QueueClosed => {
                ErrorKind::Internal
            }
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ErrorKind::Unresolvable => "unresolvable",
            ErrorKind::Unreachable => "unreachable",
            ErrorKind::PartialInstall => "partial-install",
            ErrorKind::MalformedInput => "malformed",
            ErrorKind::Internal => "internal",
        };
        f.write_str(name)
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        let ip = Ipv4Addr::new(10, 0, 0, 1);
        assert_eq!(Error::HostNotFound(ip).kind(), ErrorKind::Unresolvable);
        assert_eq!(Error::RouteNotFound(ip).kind(), ErrorKind::Unresolvable);
        assert_eq!(
            Error::NotReachable {
                src: SwitchId(1),
                dst: SwitchId(2)
            }
            .kind(),
            ErrorKind::Unreachable
        );
        assert_eq!(
            Error::InvalidPacket("short".into()).kind(),
            ErrorKind::MalformedInput
        );
    }

    #[test]
    fn test_partial_install_message() {
        let err = Error::PartialInstall {
            installed: 1,
            total: 3,
            switch: SwitchId(2),
            source: Box::new(Error::SwitchUnavailable(SwitchId(2))),
        };
        assert_eq!(err.kind(), ErrorKind::PartialInstall);
        assert!(err.to_string().contains("1/3"));
    }
}
