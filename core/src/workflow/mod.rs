pub mod approval;
pub mod controller;
pub mod run;
pub mod state;
