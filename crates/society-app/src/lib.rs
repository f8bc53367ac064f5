// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

pub mod billing;
pub mod clock;
pub mod field;
pub mod forms;
pub mod gateway;
pub mod ids;
pub mod listing;
pub mod lookup;
pub mod model;
pub mod session;

pub use billing::*;
pub use clock::*;
pub use field::*;
pub use gateway::*;
pub use ids::*;
pub use listing::*;
pub use lookup::*;
pub use model::*;
pub use session::*;
