/// Reader for OpenCV `CascadeClassifier` files in the storage XML layout
/// written by `opencv_traincascade` (the layout of the bundled
/// `haarcascade_*.xml` files).
///
/// Only boosted Haar cascades are read. Each weak classifier keeps its full
/// node tree, and features keep their `tilted` flag.
use std::str::FromStr;

use roxmltree::{Document, Node};
use thiserror::Error;

use super::haar_cascade::{
    CascadeModel, CascadeStage, HaarFeature, TreeNode, WeakClassifier, WeightedRect,
};

#[derive(Error, Debug)]
pub enum CascadeXmlError {
    #[error(transparent)]
    Xml(#[from] roxmltree::Error),
    #[error("missing <{0}> element")]
    Missing(String),
    #[error("unsupported cascade: {0}")]
    Unsupported(String),
    #[error("bad number in <{element}>: {value:?}")]
    Number { element: String, value: String },
    #[error("malformed cascade: {0}")]
    Malformed(String),
}

pub fn parse(xml: &str) -> Result<CascadeModel, CascadeXmlError> {
    let doc = Document::parse(xml)?;
    let root = doc.root_element();
    if root.tag_name().name() != "opencv_storage" {
        return Err(CascadeXmlError::Malformed(format!(
            "root element is <{}>, expected <opencv_storage>",
            root.tag_name().name()
        )));
    }
    let cascade = elements(root)
        .next()
        .ok_or_else(|| CascadeXmlError::Missing("cascade".into()))?;
    if cascade.attribute("type_id") == Some("opencv-haar-classifier") {
        return Err(CascadeXmlError::Unsupported(
            "pre-2.4 haar layout, re-save it with a current OpenCV".into(),
        ));
    }

    let stage_type = text(child(cascade, "stageType")?);
    if stage_type != "BOOST" {
        return Err(CascadeXmlError::Unsupported(format!("stage type {stage_type}")));
    }
    let feature_type = text(child(cascade, "featureType")?);
    if feature_type != "HAAR" {
        return Err(CascadeXmlError::Unsupported(format!(
            "feature type {feature_type}"
        )));
    }

    let width = number(child(cascade, "width")?)?;
    let height = number(child(cascade, "height")?)?;

    let stages = items(child(cascade, "stages")?)
        .map(read_stage)
        .collect::<Result<Vec<_>, _>>()?;
    if let Some(declared) = cascade.children().find(|n| n.has_tag_name("stageNum")) {
        let declared: usize = number(declared)?;
        if declared != stages.len() {
            return Err(CascadeXmlError::Malformed(format!(
                "stageNum says {declared}, found {} stages",
                stages.len()
            )));
        }
    }

    let features = items(child(cascade, "features")?)
        .map(read_feature)
        .collect::<Result<Vec<_>, _>>()?;

    Ok(CascadeModel {
        window: [width, height],
        features,
        stages,
    })
}

fn read_stage(node: Node) -> Result<CascadeStage, CascadeXmlError> {
    let threshold = number(child(node, "stageThreshold")?)?;
    let classifiers = items(child(node, "weakClassifiers")?)
        .map(read_weak)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(CascadeStage {
        threshold,
        classifiers,
    })
}

/// `internalNodes` holds `left right featureIdx threshold` per node; a child
/// `<= 0` names leaf `-child`.
fn read_weak(node: Node) -> Result<WeakClassifier, CascadeXmlError> {
    let internal = child(node, "internalNodes")?;
    let tokens: Vec<&str> = text(internal).split_whitespace().collect();
    if tokens.is_empty() || tokens.len() % 4 != 0 {
        return Err(CascadeXmlError::Malformed(format!(
            "internalNodes needs groups of 4 values, got {}",
            tokens.len()
        )));
    }
    let nodes = tokens
        .chunks_exact(4)
        .map(|t| -> Result<TreeNode, CascadeXmlError> {
            Ok(TreeNode {
                left: token(t[0], "internalNodes")?,
                right: token(t[1], "internalNodes")?,
                feature: token(t[2], "internalNodes")?,
                threshold: token(t[3], "internalNodes")?,
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    let leaves = text(child(node, "leafValues")?)
        .split_whitespace()
        .map(|t| token(t, "leafValues"))
        .collect::<Result<Vec<f64>, _>>()?;

    Ok(WeakClassifier { nodes, leaves })
}

fn read_feature(node: Node) -> Result<HaarFeature, CascadeXmlError> {
    let rects = items(child(node, "rects")?)
        .map(|r| -> Result<WeightedRect, CascadeXmlError> {
            let t: Vec<&str> = text(r).split_whitespace().collect();
            if t.len() != 5 {
                return Err(CascadeXmlError::Malformed(format!(
                    "rect needs `x y w h weight`, got {:?}",
                    text(r)
                )));
            }
            Ok(WeightedRect {
                x: token(t[0], "rects")?,
                y: token(t[1], "rects")?,
                width: token(t[2], "rects")?,
                height: token(t[3], "rects")?,
                weight: token(t[4], "rects")?,
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    let tilted = match node.children().find(|n| n.has_tag_name("tilted")) {
        Some(flag) => number::<u8>(flag)? != 0,
        None => false,
    };

    Ok(HaarFeature { rects, tilted })
}

fn elements<'a, 'input>(node: Node<'a, 'input>) -> impl Iterator<Item = Node<'a, 'input>> {
    node.children().filter(|n| n.is_element())
}

/// Sequence entries, stored as `<_>` children.
fn items<'a, 'input>(node: Node<'a, 'input>) -> impl Iterator<Item = Node<'a, 'input>> {
    elements(node).filter(|n| n.has_tag_name("_"))
}

fn child<'a, 'input>(node: Node<'a, 'input>, name: &str) -> Result<Node<'a, 'input>, CascadeXmlError> {
    node.children()
        .find(|n| n.has_tag_name(name))
        .ok_or_else(|| CascadeXmlError::Missing(name.to_string()))
}

fn text<'a>(node: Node<'a, '_>) -> &'a str {
    node.text().unwrap_or("").trim()
}

fn number<T: FromStr>(node: Node) -> Result<T, CascadeXmlError> {
    token(text(node), node.tag_name().name())
}

fn token<T: FromStr>(value: &str, element: &str) -> Result<T, CascadeXmlError> {
    value.parse().map_err(|_| CascadeXmlError::Number {
        element: element.to_string(),
        value: value.to_string(),
    })
}
