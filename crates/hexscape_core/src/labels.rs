//! Map labels: a leader line from an anchor to a tag, plus screen-space text
//! at the tag end.
//!
//! Label coordinates are data coordinates (x, y as the records, z as scene
//! height) and go through the same [`SceneTransform`] as the records.

use bevy::prelude::*;
use serde::{Deserialize, Serialize};

use crate::draw::world_from_scene;
use crate::geo::SceneTransform;

/// Label description as loaded from a scene file.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SceneLabel {
    pub text: String,
    /// Anchor on the map: `[x, y, z]`.
    pub from: [f64; 3],
    /// Tag position, where the text sits: `[x, y, z]`.
    pub to: [f64; 3],
    #[serde(default = "default_line_color")]
    pub line_color: [f32; 3],
    #[serde(default = "default_text_color")]
    pub text_color: [f32; 3],
    #[serde(default = "default_font_size")]
    pub font_size: f32,
}

fn default_line_color() -> [f32; 3] {
    [1.0, 1.0, 1.0]
}

fn default_text_color() -> [f32; 3] {
    [1.0, 1.0, 1.0]
}

fn default_font_size() -> f32 {
    18.0
}

impl SceneLabel {
    pub fn new(text: impl Into<String>, from: [f64; 3], to: [f64; 3]) -> Self {
        Self {
            text: text.into(),
            from,
            to,
            line_color: default_line_color(),
            text_color: default_text_color(),
            font_size: default_font_size(),
        }
    }

    /// World-space endpoints `(anchor, tag)` of the leader line.
    pub fn world_endpoints(&self, transform: &SceneTransform) -> (Vec3, Vec3) {
        let to_world = |p: [f64; 3]| {
            world_from_scene().transform_point3(Vec3::from_array(transform.point(p[0], p[1], p[2])))
        };
        (to_world(self.from), to_world(self.to))
    }
}

/// A spawned label's leader line.
#[derive(Component, Clone, Debug)]
pub struct MapLabel {
    pub anchor: Vec3,
    pub tag: Vec3,
    pub line_color: Color,
}

/// The text node following a [`MapLabel`]'s tag end on screen.
#[derive(Component, Clone, Copy, Debug)]
pub struct MapLabelText {
    pub tag: Vec3,
}

/// Spawn the line and text entities for every label.
pub fn spawn_labels(commands: &mut Commands, labels: &[SceneLabel], transform: &SceneTransform) {
    for label in labels {
        let (anchor, tag) = label.world_endpoints(transform);
        let [lr, lg, lb] = label.line_color;
        let [tr, tg, tb] = label.text_color;

        commands.spawn(MapLabel {
            anchor,
            tag,
            line_color: Color::srgb(lr, lg, lb),
        });
        commands.spawn((
            Text::new(label.text.clone()),
            TextFont {
                font_size: label.font_size,
                ..default()
            },
            TextColor(Color::srgb(tr, tg, tb)),
            Node {
                position_type: PositionType::Absolute,
                ..default()
            },
            Visibility::Hidden,
            MapLabelText { tag },
        ));
    }
}

pub fn draw_label_lines(mut gizmos: Gizmos, labels: Query<&MapLabel>) {
    for label in labels.iter() {
        gizmos.line(label.anchor, label.tag, label.line_color);
    }
}

/// Pin each label's text to the projected tag position; hide it when the
/// tag is off screen.
pub fn position_label_text(
    cameras: Query<(&Camera, &GlobalTransform)>,
    mut texts: Query<(&MapLabelText, &mut Node, &mut Visibility)>,
) {
    let Some((camera, camera_transform)) = cameras.iter().find(|(c, _)| c.is_active) else {
        return;
    };

    for (text, mut node, mut visibility) in texts.iter_mut() {
        match camera.world_to_viewport(camera_transform, text.tag) {
            Ok(screen) => {
                node.left = Val::Px(screen.x);
                node.top = Val::Px(screen.y);
                *visibility = Visibility::Inherited;
            }
            Err(_) => *visibility = Visibility::Hidden,
        }
    }
}

/// Draws spawned labels every frame.
pub struct LabelPlugin;

impl Plugin for LabelPlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(Update, (draw_label_lines, position_label_text));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoints_follow_scene_transform() {
        let transform = SceneTransform::new((2.0, 46.0));
        let label = SceneLabel::new("Paris", [2.35, 48.85, 0.0], [2.35, 48.85, 1.5]);
        let (anchor, tag) = label.world_endpoints(&transform);

        // Scene (x, y, z) maps to world (x, z, -y).
        let sx = ((2.35 - 2.0) * 2.0) as f32;
        let sy = ((48.85 - 46.0) * 2.0) as f32;
        assert!((anchor - Vec3::new(sx, 0.0, -sy)).length() < 1e-5);
        assert!((tag - Vec3::new(sx, 1.5, -sy)).length() < 1e-5);
    }

    #[test]
    fn test_label_defaults_from_json() {
        let label: SceneLabel = serde_json::from_str(
            r#"{"text": "Lyon", "from": [4.8, 45.7, 0.0], "to": [5.5, 46.5, 1.0]}"#,
        )
        .unwrap();
        assert_eq!(label.text, "Lyon");
        assert_eq!(label.line_color, [1.0, 1.0, 1.0]);
        assert_eq!(label.font_size, 18.0);
    }
}
