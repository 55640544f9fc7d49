use std::fmt;

/// Where the calling code is running.
///
/// The host application knows this at startup (extension page vs. injected
/// content script vs. desktop wrapper vs. userscript sandbox) and injects it
/// into the client, so transport selection never probes ambient globals and
/// tests can force any variant.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum ExecutionContext {
    /// A privileged extension page (its protocol is an extension scheme).
    ExtensionPage,
    /// An ordinary third-party web page running the injected content script.
    WebPage,
    /// The desktop wrapper application.
    DesktopApp,
    /// A userscript sandbox with a privileged fetch available.
    Userscript,
}

impl ExecutionContext {
    /// Resolves the transport mode used for every request issued from this
    /// context. Evaluated once per request and never revisited mid-stream.
    pub fn transport_mode(self) -> TransportMode {
        match self {
            Self::ExtensionPage => TransportMode::Direct,
            Self::WebPage => TransportMode::Relayed,
            Self::DesktopApp | Self::Userscript => TransportMode::DesktopNative,
        }
    }
}

/// Strategy used to carry a single streaming request.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum TransportMode {
    /// Fetch directly from a privileged extension page.
    Direct,
    /// Proxy the request through the privileged background relay channel.
    Relayed,
    /// Fetch with the platform's native or userscript-privileged client.
    DesktopNative,
}

impl fmt::Display for TransportMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Direct => "direct",
            Self::Relayed => "relayed",
            Self::DesktopNative => "desktop-native",
        };
        f.write_str(name)
    }
}
