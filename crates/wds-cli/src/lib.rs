//! Terminal front end for the watermark detection survey.

pub mod logging;
pub mod summary;
pub mod terminal;
