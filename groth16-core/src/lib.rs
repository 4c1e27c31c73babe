#![allow(type_alias_bounds)]
#![allow(clippy::assertions_on_result_states)]
#![allow(clippy::needless_range_loop)]
#![allow(clippy::len_without_is_empty)]
#![allow(clippy::too_long_first_doc_paragraph)]

pub mod backend;
pub mod curves;
pub mod dag;
pub mod groth16;
pub mod poly;
pub mod r1cs;
pub mod transcripts;
pub mod utils;
