//! Caption composition.
//!
//! A `Caption` is built as a structured value first and rendered to text as
//! a separate, pure step. The same ordered input always renders to the same
//! bytes.

use std::fmt;

use crate::spatial::SpatialDescriptor;

/// Text used whenever a frame has nothing to narrate.
pub const EMPTY_SCENE_CAPTION: &str = "No objects detected.";

/// Default cap on objects mentioned in one caption.
pub const DEFAULT_MAX_OBJECTS: usize = 3;

/// A labelled object with its position in the frame.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AnnotatedObject {
    pub label: String,
    pub spatial: SpatialDescriptor,
}

impl AnnotatedObject {
    pub fn new(label: impl Into<String>, spatial: SpatialDescriptor) -> Self {
        Self {
            label: label.into(),
            spatial,
        }
    }

    /// `"A <label> is on the <horizontal> <depth>"`, without terminator.
    pub fn sentence(&self) -> String {
        format!(
            "A {} is on the {} {}",
            self.label, self.spatial.horizontal, self.spatial.depth
        )
    }
}

/// An immutable caption: the empty-scene sentinel or a bounded object list.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Caption {
    objects: Vec<AnnotatedObject>,
}

impl Caption {
    pub fn empty() -> Self {
        Self {
            objects: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Objects the caption mentions, in narration order.
    pub fn objects(&self) -> &[AnnotatedObject] {
        &self.objects
    }

    pub fn text(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for Caption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.objects.is_empty() {
            return f.write_str(EMPTY_SCENE_CAPTION);
        }
        for (i, object) in self.objects.iter().enumerate() {
            if i > 0 {
                f.write_str(". ")?;
            }
            f.write_str(&object.sentence())?;
        }
        f.write_str(".")
    }
}

/// Builds captions mentioning at most `max_objects` objects.
#[derive(Clone, Copy, Debug)]
pub struct CaptionComposer {
    max_objects: usize,
}

impl CaptionComposer {
    pub fn new(max_objects: usize) -> Self {
        Self {
            max_objects: max_objects.max(1),
        }
    }

    pub fn max_objects(&self) -> usize {
        self.max_objects
    }

    /// Keep the first `max_objects` in the given order. No re-ranking.
    pub fn compose(&self, objects: &[AnnotatedObject]) -> Caption {
        Caption {
            objects: objects.iter().take(self.max_objects).cloned().collect(),
        }
    }
}

impl Default for CaptionComposer {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_OBJECTS)
    }
}

/// Compose with the default three-object cap.
pub fn compose(objects: &[AnnotatedObject]) -> Caption {
    CaptionComposer::default().compose(objects)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spatial::{Depth, Horizontal};

    fn object(label: &str, horizontal: Horizontal, depth: Depth) -> AnnotatedObject {
        AnnotatedObject::new(label, SpatialDescriptor { horizontal, depth })
    }

    #[test]
    fn empty_input_yields_sentinel() {
        let caption = compose(&[]);
        assert!(caption.is_empty());
        assert_eq!(caption.text(), "No objects detected.");
    }

    #[test]
    fn single_object_sentence() {
        let caption = compose(&[object("cup", Horizontal::Center, Depth::MidDistance)]);
        assert_eq!(caption.text(), "A cup is on the center mid-distance.");
    }

    #[test]
    fn objects_join_with_period_space() {
        let caption = compose(&[
            object("person", Horizontal::Left, Depth::Near),
            object("dog", Horizontal::Right, Depth::Far),
        ]);
        assert_eq!(
            caption.text(),
            "A person is on the left near. A dog is on the right far."
        );
    }

    #[test]
    fn keeps_first_three_in_order() {
        let objects: Vec<_> = (0..10)
            .map(|i| object(&format!("thing{}", i), Horizontal::Center, Depth::Far))
            .collect();
        let caption = compose(&objects);
        let labels: Vec<_> = caption.objects().iter().map(|o| o.label.as_str()).collect();
        assert_eq!(labels, vec!["thing0", "thing1", "thing2"]);
        assert_eq!(caption.text().matches(" is on the ").count(), 3);
        assert!(caption.text().ends_with("far."));
        assert!(!caption.text().ends_with(".."));
    }

    #[test]
    fn compose_is_deterministic() {
        let objects = vec![
            object("chair", Horizontal::Right, Depth::Near),
            object("tv", Horizontal::Center, Depth::Far),
        ];
        let first = compose(&objects).text();
        for _ in 0..5 {
            assert_eq!(compose(&objects).text(), first);
        }
    }

    #[test]
    fn composer_cap_is_configurable() {
        let objects = vec![
            object("a", Horizontal::Left, Depth::Far),
            object("b", Horizontal::Left, Depth::Far),
        ];
        assert_eq!(CaptionComposer::new(1).compose(&objects).objects().len(), 1);
        assert_eq!(CaptionComposer::new(0).max_objects(), 1);
    }
}
