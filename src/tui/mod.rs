pub mod footer;
pub mod form;
pub mod header;
pub mod panes;
pub mod render;
pub mod spinner;
