//! IANA definitions used by the server core.
//!
//! Only the handful of values the core needs to reason about are named.
//! Anything else can still be represented via `from_int`.
#![allow(clippy::upper_case_acronyms)]

use core::fmt;

//------------ int_enum ------------------------------------------------------

/// Creates a newtype over an integer with named constants and mnemonics.
macro_rules! int_enum {
    ( $(#[$attr:meta])* =>
      $ianatype:ident, $inttype:path;
      $( $(#[$variant_attr:meta])* ( $variant:ident =>
                                        $value:expr, $mnemonic:expr) )* ) => {
        $(#[$attr])*
        #[derive(Clone, Copy, Eq, Hash, Ord, PartialEq, PartialOrd)]
        pub struct $ianatype($inttype);

        impl $ianatype {
            $(
                $(#[$variant_attr])*
                pub const $variant: $ianatype = $ianatype($value);
            )*
        }

        impl $ianatype {
            /// Returns a value from its raw integer value.
            #[must_use]
            pub const fn from_int(value: $inttype) -> Self {
                Self(value)
            }

            /// Returns the raw integer value for a value.
            #[must_use]
            pub const fn to_int(self) -> $inttype {
                self.0
            }

            /// Returns a value from a well-defined mnemonic.
            #[must_use]
            pub fn from_mnemonic(m: &str) -> Option<Self> {
                $(
                    if m.eq_ignore_ascii_case($mnemonic) {
                        return Some($ianatype::$variant)
                    }
                )*
                None
            }

            /// Returns the mnemonic for this value if there is one.
            #[must_use]
            pub const fn to_mnemonic(self) -> Option<&'static str> {
                match self {
                    $(
                        $ianatype::$variant => Some($mnemonic),
                    )*
                    _ => None
                }
            }
        }

        impl fmt::Display for $ianatype {
            fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
                match self.to_mnemonic() {
                    Some(m) => f.write_str(m),
                    None => write!(f, "{}{}", stringify!($ianatype).to_uppercase(), self.0),
                }
            }
        }

        impl fmt::Debug for $ianatype {
            fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
                match self.to_mnemonic() {
                    Some(m) => {
                        write!(f, "{}::{}", stringify!($ianatype), m)
                    }
                    None => {
                        write!(f, "{}({})", stringify!($ianatype), self.0)
                    }
                }
            }
        }
    }
}

//------------ Rtype ---------------------------------------------------------

int_enum! {
    /// Resource record types.
    =>
    Rtype, u16;

    /// A host address.
    (A => 1, "A")

    /// An authoritative name server.
    (NS => 2, "NS")

    /// The canonical name for an alias.
    (CNAME => 5, "CNAME")

    /// Marks the start of a zone of authority.
    (SOA => 6, "SOA")

    /// A domain name pointer.
    (PTR => 12, "PTR")

    /// Text strings.
    (TXT => 16, "TXT")

    /// IPv6 address.
    (AAAA => 28, "AAAA")

    /// Server selection.
    (SRV => 33, "SRV")

    /// Incremental transfer.
    (IXFR => 251, "IXFR")

    /// Transfer of an entire zone.
    (AXFR => 252, "AXFR")

    /// A request for all records.
    (ANY => 255, "ANY")
}

impl Rtype {
    /// Returns whether this type requests a zone transfer.
    pub fn is_xfr(self) -> bool {
        self == Rtype::AXFR || self == Rtype::IXFR
    }
}

//------------ Class ---------------------------------------------------------

int_enum! {
    /// DNS classes.
    =>
    Class, u16;

    /// Internet (IN).
    (IN => 1, "IN")

    /// Chaosnet (CH).
    (CH => 3, "CH")

    /// Any class.
    (ANY => 255, "ANY")
}

impl Default for Class {
    fn default() -> Self {
        Class::IN
    }
}

//------------ Rcode ---------------------------------------------------------

int_enum! {
    /// DNS response codes.
    =>
    Rcode, u8;

    /// No error condition.
    (NOERROR => 0, "NOERROR")

    /// Format error.
    (FORMERR => 1, "FORMERR")

    /// Server failure.
    (SERVFAIL => 2, "SERVFAIL")

    /// Name error.
    (NXDOMAIN => 3, "NXDOMAIN")

    /// Not implemented.
    (NOTIMP => 4, "NOTIMP")

    /// Query refused.
    (REFUSED => 5, "REFUSED")

    /// Server not authoritative for zone.
    (NOTAUTH => 9, "NOTAUTH")
}

impl Default for Rcode {
    fn default() -> Self {
        Rcode::NOERROR
    }
}

//------------ Opcode --------------------------------------------------------

int_enum! {
    /// DNS operation codes.
    =>
    Opcode, u8;

    /// A standard query.
    (QUERY => 0, "QUERY")

    /// A zone change notification.
    (NOTIFY => 4, "NOTIFY")

    /// A dynamic update.
    (UPDATE => 5, "UPDATE")
}

impl Default for Opcode {
    fn default() -> Self {
        Opcode::QUERY
    }
}

//============ Testing =======================================================

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn mnemonics() {
        assert_eq!(Rtype::from_mnemonic("srv"), Some(Rtype::SRV));
        assert_eq!(Rtype::SRV.to_string(), "SRV");
        assert_eq!(Rtype::from_int(99).to_string(), "RTYPE99");
        assert!(Rtype::IXFR.is_xfr());
        assert!(!Rtype::SOA.is_xfr());
        assert_eq!(Rcode::SERVFAIL.to_int(), 2);
    }
}
