// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
pub mod fhe_type;
pub mod handle;
pub mod cleartext;

pub use cleartext::Cleartext;
pub use fhe_type::FheType;
pub use handle::Handle;
