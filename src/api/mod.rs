mod events;
mod impls;
mod market;
mod requests;
mod responses;
mod util;

pub use events::*;
pub use impls::*;
pub use market::*;
pub use requests::*;
pub use responses::*;
pub use util::*;
