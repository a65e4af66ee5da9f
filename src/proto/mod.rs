//! Wire-level building blocks shared by the classifier, the tracker and the
//! pipeline.

pub mod casemap;
pub mod codec;
pub mod ctcp;
pub mod identity;
pub mod numeric;

pub use casemap::CaseMapping;
pub use codec::IrcLineCodec;
pub use identity::Identity;
