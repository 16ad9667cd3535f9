#![cfg_attr(docsrs, feature(doc_auto_cfg))]

pub mod args;
pub mod bin_util;
pub mod errors;
pub mod logging;
mod main_impl;
pub mod render;
pub mod resolve;

pub use main_impl::do_main;
