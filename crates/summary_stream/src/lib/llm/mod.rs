pub mod completion;
pub mod event_stream;
pub mod openai;
pub mod summarizer;
