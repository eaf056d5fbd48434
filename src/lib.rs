//! Content-extraction and reconstitution pipeline for scraped exam-question
//! pages: unpack a batch of question folders, parse the two markup fragments
//! per question into a canonical record, persist the exam, and reserialize it
//! as one self-contained offline study document.

pub mod assemble;
pub mod bundle;
pub mod dedup;
pub mod parser;
pub mod store;
pub mod unpack;
