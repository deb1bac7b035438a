//! Device-side pieces of the karaoke client, kept free of any UI toolkit so a
//! front end can embed them: the persisted identity and gate cache, the view
//! router and the live projections rendered from queue snapshots.

pub mod device;
pub mod router;
pub mod view;

pub use device::{DeviceStore, DeviceStoreError, GateCache, IdentityStore};
pub use router::{Navigation, Notice, RouteContext, Screen, navigate, shows_nav};
pub use view::{Banner, ClientView, SharedView};
