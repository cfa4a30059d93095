pub mod catalog;
pub mod container;
pub mod descriptor;
pub mod layout;
pub mod writer;
