pub(crate) mod paired_reads;
