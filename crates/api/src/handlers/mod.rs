//! REST-Handler Module

pub mod konversationen;
pub mod nachrichten;
pub mod sitzung;
pub mod ungelesen;
