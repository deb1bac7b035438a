/// Screens of the patron and staff client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Screen {
    /// Shown while the first snapshot is loading.
    Splash,
    Home,
    /// Name and table entry.
    Identification,
    RequestForm,
    /// Review before sending; needs a drafted request.
    Confirmation,
    Success,
    MyRequests,
    Info,
    AdminLogin,
    AdminDashboard,
    /// Storage can never be reached with the current settings.
    Unavailable,
}

/// Transient message shown on top of the current screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Notice {
    /// The request flow was entered while the session gate is closed.
    SessionClosed,
}

/// Facts about the device the router needs to resolve a target screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RouteContext {
    pub identified: bool,
    pub session_open: bool,
    pub admin_logged_in: bool,
    /// A song and dedication are waiting for confirmation.
    pub has_draft: bool,
    pub misconfigured: bool,
}

impl Default for RouteContext {
    fn default() -> Self {
        Self {
            identified: false,
            session_open: true,
            admin_logged_in: false,
            has_draft: false,
            misconfigured: false,
        }
    }
}

/// Result of a navigation attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Navigation {
    pub screen: Screen,
    pub notice: Option<Notice>,
}

impl Navigation {
    fn to(screen: Screen) -> Self {
        Self {
            screen,
            notice: None,
        }
    }
}

/// Resolve where a request to show `target` actually lands.
pub fn navigate(current: Screen, target: Screen, ctx: &RouteContext) -> Navigation {
    if ctx.misconfigured {
        return Navigation::to(Screen::Unavailable);
    }

    match target {
        Screen::Identification | Screen::RequestForm if !ctx.session_open => Navigation {
            screen: current,
            notice: Some(Notice::SessionClosed),
        },
        Screen::Identification if ctx.identified => Navigation::to(Screen::RequestForm),
        Screen::RequestForm if !ctx.identified => Navigation::to(Screen::Identification),
        Screen::Confirmation if !ctx.identified || !ctx.has_draft => Navigation::to(Screen::Home),
        Screen::AdminLogin if ctx.admin_logged_in => Navigation::to(Screen::AdminDashboard),
        Screen::AdminDashboard if !ctx.admin_logged_in => Navigation::to(Screen::AdminLogin),
        Screen::Unavailable => Navigation::to(Screen::Home),
        other => Navigation::to(other),
    }
}

/// Whether the bottom navigation bar is visible on `screen`.
pub fn shows_nav(screen: Screen) -> bool {
    matches!(
        screen,
        Screen::Home
            | Screen::Identification
            | Screen::RequestForm
            | Screen::MyRequests
            | Screen::Info
    )
}

/// Whether `item` should be highlighted in the navigation bar while on `active`.
/// The "request" item stays lit across the whole request flow.
pub fn nav_item_active(item: Screen, active: Screen) -> bool {
    match item {
        Screen::Identification => matches!(
            active,
            Screen::Identification | Screen::RequestForm | Screen::Confirmation
        ),
        _ => item == active,
    }
}
