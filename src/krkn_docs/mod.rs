// Values shared with the runtime RAG service; it looks the collection up by
// exactly these names and chunking parameters.
pub const COLLECTION_NAME: &str = "krkn-docs";
pub const PERSIST_DIR: &str = "/app/docs_index";
pub const EMBEDDING_MODEL: &str = "qwen-small";
pub const CHUNK_SIZE: usize = 1000; // characters
pub const CHUNK_OVERLAP: usize = 200; // characters
pub const HELP_FILE: &str = "/app/krknctl_help.txt";
pub const MODEL_DIR: &str = "/app/models";

/// Documentation repositories as `(url, docs path inside the checkout)`.
pub const REPO_SOURCES: &[(&str, &str)] = &[
    ("https://github.com/krkn-chaos/website", "content/en/docs"),
    ("https://github.com/krkn-chaos/krkn-hub", "."),
];
