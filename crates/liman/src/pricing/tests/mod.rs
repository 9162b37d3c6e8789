mod common;
mod formula;
