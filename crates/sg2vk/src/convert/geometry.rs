//! Geometry payload assembly
//!
//! Turns a source geometry leaf into either a retained geometry node or a
//! flat command list, honoring the masked-down attribute set.

use ash::vk;

use crate::render::{
    AttributeArray, Command, Commands, DrawCommand, Geometry, RenderNode,
};
use crate::scene;
use crate::scene::SourceArray;
use crate::shader::{AttributeLocation, GeometryAttributes};

use super::arrays::copy_array;
use super::GeometryTarget;

/// Convert the data payload of a geometry leaf
///
/// `translations` overrides the geometry's own per-instance translation
/// array; billboards inject their collected instance positions this way
/// without touching the source. Returns `None` when the masked attribute
/// set has no usable vertices.
pub(crate) fn convert_geometry_payload(
    geometry: &scene::Geometry,
    attributes: GeometryAttributes,
    translations: Option<&SourceArray>,
    target: GeometryTarget,
) -> Option<RenderNode> {
    if !attributes.contains(GeometryAttributes::VERTEX) {
        return None;
    }
    let vertices = copy_array(geometry.vertices.as_ref())?;
    let vertex_count = vertices.len() as u32;

    let mut arrays = vec![AttributeArray {
        location: AttributeLocation::VERTEX,
        rate: vk::VertexInputRate::VERTEX,
        data: vertices,
    }];

    if attributes.intersects(GeometryAttributes::NORMAL | GeometryAttributes::NORMAL_OVERALL) {
        if let Some(data) = copy_array(geometry.normals.as_ref()) {
            arrays.push(AttributeArray {
                location: AttributeLocation::NORMAL,
                rate: vk::VertexInputRate::VERTEX,
                data,
            });
        }
    }
    if attributes.intersects(GeometryAttributes::COLOR | GeometryAttributes::COLOR_OVERALL) {
        if let Some(data) = copy_array(geometry.colors.as_ref()) {
            arrays.push(AttributeArray {
                location: AttributeLocation::COLOR,
                rate: vk::VertexInputRate::VERTEX,
                data,
            });
        }
    }
    if attributes.contains(GeometryAttributes::TEXCOORD) {
        if let Some(data) = copy_array(geometry.tex_coords.as_ref()) {
            arrays.push(AttributeArray {
                location: AttributeLocation::TEXCOORD,
                rate: vk::VertexInputRate::VERTEX,
                data,
            });
        }
    }

    let mut instance_count = 1;
    if attributes.contains(GeometryAttributes::TRANSLATE) {
        let source = translations.or(geometry.translations.as_ref());
        if let Some(data) = copy_array(source) {
            instance_count = data.len() as u32;
            arrays.push(AttributeArray {
                location: AttributeLocation::TRANSLATE,
                rate: vk::VertexInputRate::INSTANCE,
                data,
            });
        }
    }

    let indices = copy_array(geometry.indices.as_ref());
    let draw = match &indices {
        Some(index_data) => DrawCommand::DrawIndexed {
            index_count: index_data.len() as u32,
            instance_count,
        },
        None => DrawCommand::Draw {
            vertex_count,
            instance_count,
        },
    };

    let node = match target {
        GeometryTarget::Geometry => RenderNode::Geometry(Geometry {
            arrays,
            indices,
            draw,
        }),
        GeometryTarget::Commands => {
            let mut commands = vec![Command::BindVertexBuffers {
                first_binding: 0,
                arrays,
            }];
            if let Some(index_data) = indices {
                let index_type = index_data.index_type().unwrap_or(vk::IndexType::UINT32);
                commands.push(Command::BindIndexBuffer {
                    indices: index_data,
                    index_type,
                });
            }
            commands.push(Command::Draw(draw));
            RenderNode::Commands(Commands { commands })
        }
    };

    Some(node)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::ElementType;

    fn triangle() -> scene::Geometry {
        scene::Geometry {
            vertices: Some(SourceArray::from_vec3s(&[
                [0.0, 0.0, 0.0],
                [1.0, 0.0, 0.0],
                [0.0, 1.0, 0.0],
            ])),
            tex_coords: Some(SourceArray::from_vec2s(&[[0.0, 0.0], [1.0, 0.0], [0.0, 1.0]])),
            indices: Some(SourceArray::from_ushorts(&[0, 1, 2])),
            ..scene::Geometry::default()
        }
    }

    #[test]
    fn test_retained_geometry_payload() {
        let node = convert_geometry_payload(
            &triangle(),
            GeometryAttributes::VERTEX | GeometryAttributes::TEXCOORD,
            None,
            GeometryTarget::Geometry,
        )
        .unwrap();

        let RenderNode::Geometry(geometry) = node else {
            panic!("expected retained geometry");
        };
        assert_eq!(geometry.arrays.len(), 2);
        assert_eq!(
            geometry.draw,
            DrawCommand::DrawIndexed {
                index_count: 3,
                instance_count: 1
            }
        );
    }

    #[test]
    fn test_command_list_payload() {
        let node = convert_geometry_payload(
            &triangle(),
            GeometryAttributes::VERTEX,
            None,
            GeometryTarget::Commands,
        )
        .unwrap();

        let RenderNode::Commands(commands) = node else {
            panic!("expected command list");
        };
        assert_eq!(commands.commands.len(), 3);
        assert!(matches!(
            commands.commands[1],
            Command::BindIndexBuffer {
                index_type: vk::IndexType::UINT16,
                ..
            }
        ));
        assert!(matches!(
            commands.commands[2],
            Command::Draw(DrawCommand::DrawIndexed { index_count: 3, .. })
        ));
    }

    #[test]
    fn test_masked_out_attributes_are_dropped() {
        let node = convert_geometry_payload(
            &triangle(),
            GeometryAttributes::VERTEX,
            None,
            GeometryTarget::Geometry,
        )
        .unwrap();

        let RenderNode::Geometry(geometry) = node else {
            panic!("expected retained geometry");
        };
        assert_eq!(geometry.arrays.len(), 1);
        assert_eq!(geometry.arrays[0].location, AttributeLocation::VERTEX);
    }

    #[test]
    fn test_injected_translations_set_instance_count() {
        let translations = SourceArray::from_vec3s(&[[0.0; 3], [1.0, 0.0, 0.0], [2.0, 0.0, 0.0]]);
        let node = convert_geometry_payload(
            &triangle(),
            GeometryAttributes::VERTEX | GeometryAttributes::TRANSLATE,
            Some(&translations),
            GeometryTarget::Geometry,
        )
        .unwrap();

        let RenderNode::Geometry(geometry) = node else {
            panic!("expected retained geometry");
        };
        let translate = geometry
            .arrays
            .iter()
            .find(|a| a.location == AttributeLocation::TRANSLATE)
            .unwrap();
        assert_eq!(translate.rate, vk::VertexInputRate::INSTANCE);
        assert_eq!(
            geometry.draw,
            DrawCommand::DrawIndexed {
                index_count: 3,
                instance_count: 3
            }
        );
    }

    #[test]
    fn test_unsupported_vertices_degrade_to_absent() {
        let geometry = scene::Geometry {
            vertices: Some(SourceArray::from_raw(ElementType::Vec3d, vec![0; 24])),
            ..scene::Geometry::default()
        };
        // Vec3d vertices are supported; use a genuinely unsupported type.
        assert!(convert_geometry_payload(
            &geometry,
            GeometryAttributes::VERTEX,
            None,
            GeometryTarget::Geometry
        )
        .is_some());

        let unsupported = scene::Geometry {
            vertices: Some(SourceArray::from_raw(ElementType::Vec3s, vec![0; 12])),
            ..scene::Geometry::default()
        };
        assert!(convert_geometry_payload(
            &unsupported,
            GeometryAttributes::VERTEX,
            None,
            GeometryTarget::Geometry
        )
        .is_none());
    }
}
