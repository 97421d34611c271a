/// Server write-batch size limit, reused from the oplog envelope constant
/// as the default bulk-buffer byte ceiling.
pub const DEFAULT_BULK_BUFFER_BYTES: usize = 16 * 1024 * 1024;
pub const DEFAULT_BULK_BUFFER_DOCS: usize = 1000;

/// The insertion policy for one restore run.
///
/// `maintain_insertion_order` forces `num_insertion_workers` to 1 and
/// `stop_on_error` to true — enforced here in the constructor rather than
/// rejected as an illegal combination, since it is a implied normalization,
/// not a contradiction.
#[derive(Debug, Clone)]
pub struct InsertionPolicy {
    pub num_insertion_workers: usize,
    pub num_parallel_collections: usize,
    pub stop_on_error: bool,
    pub maintain_insertion_order: bool,
    pub bypass_document_validation: bool,
    pub bulk_buffer_docs: usize,
    pub bulk_buffer_bytes: usize,
}

impl InsertionPolicy {
    pub fn new(
        num_insertion_workers: usize,
        num_parallel_collections: usize,
        stop_on_error: bool,
        maintain_insertion_order: bool,
        bypass_document_validation: bool,
    ) -> Self {
        let (num_insertion_workers, stop_on_error) = if maintain_insertion_order {
            (1, true)
        } else {
            (num_insertion_workers.max(1), stop_on_error)
        };
        InsertionPolicy {
            num_insertion_workers,
            num_parallel_collections: num_parallel_collections.max(1),
            stop_on_error,
            maintain_insertion_order,
            bypass_document_validation,
            bulk_buffer_docs: DEFAULT_BULK_BUFFER_DOCS,
            bulk_buffer_bytes: DEFAULT_BULK_BUFFER_BYTES,
        }
    }

    /// Channel high-water mark: 16x the bulk buffer size in documents.
    pub fn channel_capacity(&self) -> usize {
        self.bulk_buffer_docs * 16
    }
}
