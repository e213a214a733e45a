//! Types associated with the `org.freedesktop.DBus` interface.

/// Well known destination name of the bus daemon.
pub const DESTINATION: &str = "org.freedesktop.DBus";

/// Well known interface name of the bus daemon.
pub const INTERFACE: &str = "org.freedesktop.DBus";

/// Well known D-Bus path of the bus daemon.
pub const PATH: &str = "/org/freedesktop/DBus";

/// The peer interface served for every exported path.
pub const PEER_INTERFACE: &str = "org.freedesktop.DBus.Peer";

/// The introspection interface.
pub const INTROSPECTABLE_INTERFACE: &str = "org.freedesktop.DBus.Introspectable";

/// The generic failure error name.
pub const ERROR_FAILED: &str = "org.freedesktop.DBus.Error.Failed";

/// The error name used when a called method does not exist.
pub const ERROR_UNKNOWN_METHOD: &str = "org.freedesktop.DBus.Error.UnknownMethod";

/// The error name used when no object lives at the called path.
pub const ERROR_UNKNOWN_OBJECT: &str = "org.freedesktop.DBus.Error.UnknownObject";

/// The error name used when the called interface is not exported.
pub const ERROR_UNKNOWN_INTERFACE: &str = "org.freedesktop.DBus.Error.UnknownInterface";

/// The error name used when arguments do not match the method signature.
pub const ERROR_INVALID_ARGS: &str = "org.freedesktop.DBus.Error.InvalidArgs";

raw_set! {
    /// The flags to a `RequestName` call.
    #[repr(u32)]
    pub enum NameFlag {
        /// Allow another application specifying `REPLACE_EXISTING` to take
        /// the name over; this application receives a
        /// `org.freedesktop.DBus.NameLost` signal when that happens.
        ALLOW_REPLACEMENT = 1,
        /// Try to replace the current owner if there is one, provided the
        /// current owner specified `ALLOW_REPLACEMENT`.
        REPLACE_EXISTING = 2,
        /// Fail the request instead of queueing when the name is already
        /// owned.
        DO_NOT_QUEUE = 4,
    }
}

raw_enum! {
    /// The reply to a `RequestName` call.
    #[repr(u32)]
    pub enum NameReply {
        /// The caller is now the primary owner of the name.
        PRIMARY_OWNER = 1,
        /// The name already had an owner and the caller has been queued
        /// for it.
        IN_QUEUE = 2,
        /// The name already has an owner and `DO_NOT_QUEUE` was specified.
        EXISTS = 3,
        /// The caller already owns the name.
        ALREADY_OWNER = 4,
    }
}

raw_enum! {
    /// The reply to a `ReleaseName` call.
    #[repr(u32)]
    pub enum ReleaseNameReply {
        /// The caller released the name.
        RELEASED = 1,
        /// The name does not exist on the bus.
        NON_EXISTENT = 2,
        /// The caller was not the owner and not in the queue.
        NOT_OWNER = 3,
    }
}
