mod finger_table;

pub use finger_table::FingerTable;
