/// One downloadable recording segment found on the record management view.
///
/// `record_method` and `segment_title` are already safe to use in file names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoEntry {
    pub download_url: String,
    pub record_date: String,
    pub record_method: String,
    pub segment_title: String,
}
