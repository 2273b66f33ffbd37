mod destination;

pub use destination::*;
