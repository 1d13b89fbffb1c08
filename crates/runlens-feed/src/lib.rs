pub mod client;
pub mod contracts;
pub mod controller;
pub mod observer;
pub mod simulated;

pub use client::*;
pub use contracts::*;
pub use controller::*;
pub use observer::*;
pub use simulated::*;
