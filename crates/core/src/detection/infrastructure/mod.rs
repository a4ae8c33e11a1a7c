pub mod algorithm_factory;
pub mod edge_detector;
pub mod feature_cascade_detector;
pub mod haar_cascade;
pub mod integral_image;
pub mod opencv_cascade_xml;
