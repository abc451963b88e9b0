mod extension;
mod video;
mod work_item;

pub use extension::Extension;
pub use video::VideoEntry;
pub use work_item::WorkItem;
