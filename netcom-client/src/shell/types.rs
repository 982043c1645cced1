use std::fmt;
use std::str::FromStr;

use bitflags::bitflags;

bitflags! {
    /// `ASSOCF` flags for `Init` and `GetString`.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct AssociationFlags: u32 {
        const INIT_NOREMAPCLSID = 0x0000_0001;
        const INIT_BYEXENAME = 0x0000_0002;
        const INIT_DEFAULTTOSTAR = 0x0000_0004;
        const INIT_DEFAULTTOFOLDER = 0x0000_0008;
        const NOUSERSETTINGS = 0x0000_0010;
        const NOTRUNCATE = 0x0000_0020;
        const VERIFY = 0x0000_0040;
        const REMAPRUNDLL = 0x0000_0080;
        const NOFIXUPS = 0x0000_0100;
        const IGNOREBASECLASS = 0x0000_0200;
        const INIT_IGNOREUNKNOWN = 0x0000_0400;
        const INIT_FIXED_PROGID = 0x0000_0800;
        const IS_PROTOCOL = 0x0000_1000;
        const INIT_FOR_FILE = 0x0000_2000;
    }
}

macro_rules! association_strings {
    ($($variant:ident = $value:literal, $name:literal;)*) => {
        /// `ASSOCSTR`: which string `GetString` retrieves.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum AssociationString {
            $($variant,)*
            Other(i32),
        }

        impl AssociationString {
            /// Every named kind, in native order.
            pub const ALL: &'static [Self] = &[$(Self::$variant,)*];

            pub const fn to_native(self) -> i32 {
                match self {
                    $(Self::$variant => $value,)*
                    Self::Other(v) => v,
                }
            }

            /// Short kebab-case name, as accepted by [`FromStr`].
            pub const fn name(self) -> &'static str {
                match self {
                    $(Self::$variant => $name,)*
                    Self::Other(_) => "other",
                }
            }
        }

        impl From<i32> for AssociationString {
            fn from(value: i32) -> Self {
                match value {
                    $($value => Self::$variant,)*
                    other => Self::Other(other),
                }
            }
        }

        impl FromStr for AssociationString {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.to_ascii_lowercase().as_str() {
                    $($name => Ok(Self::$variant),)*
                    other => other
                        .parse::<i32>()
                        .map(Self::from)
                        .map_err(|_| format!("unknown association string kind: {s}")),
                }
            }
        }
    };
}

association_strings! {
    Command = 1, "command";
    Executable = 2, "executable";
    FriendlyDocName = 3, "friendly-doc-name";
    FriendlyAppName = 4, "friendly-app-name";
    NoOpen = 5, "no-open";
    ShellNewValue = 6, "shell-new-value";
    DdeCommand = 7, "dde-command";
    DdeIfExec = 8, "dde-if-exec";
    DdeApplication = 9, "dde-application";
    DdeTopic = 10, "dde-topic";
    InfoTip = 11, "info-tip";
    QuickTip = 12, "quick-tip";
    TileInfo = 13, "tile-info";
    ContentType = 14, "content-type";
    DefaultIcon = 15, "default-icon";
    ShellExtension = 16, "shell-extension";
    DropTarget = 17, "drop-target";
    DelegateExecute = 18, "delegate-execute";
    SupportedUriProtocols = 19, "supported-uri-protocols";
    ProgId = 20, "prog-id";
    AppId = 21, "app-id";
    AppPublisher = 22, "app-publisher";
    AppIconReference = 23, "app-icon-reference";
}

impl fmt::Display for AssociationString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Other(v) => write!(f, "{v}"),
            named => f.write_str(named.name()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_parse_back() {
        for kind in AssociationString::ALL {
            assert_eq!(kind.name().parse::<AssociationString>().unwrap(), *kind);
        }
    }

    #[test]
    fn numeric_and_unknown_kinds() {
        assert_eq!("2".parse::<AssociationString>().unwrap(), AssociationString::Executable);
        assert_eq!("99".parse::<AssociationString>().unwrap(), AssociationString::Other(99));
        assert!("bogus".parse::<AssociationString>().is_err());
        assert_eq!(AssociationString::Other(99).to_string(), "99");
        assert_eq!(AssociationString::ContentType.to_native(), 14);
    }
}
