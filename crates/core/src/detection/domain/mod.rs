pub mod detection_algorithm;
pub mod object_classifier;
pub mod operation_mode;
