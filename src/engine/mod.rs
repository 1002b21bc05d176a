pub mod book;
pub mod controller;
pub mod ledger;
pub mod spread;
pub mod supervisor;
