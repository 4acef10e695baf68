//! End-to-end conversion tests over small hand-built graphs

use std::sync::Arc;

use approx::assert_relative_eq;
use ash::vk;

use crate::convert::{convert_scene, ConvertSettings, GeometryTarget, SceneConverter};
use crate::render::{
    GpuContext, OfflineGpuContext, RenderNode, ShaderCompileError, ShaderModule, StateCommand,
};
use crate::scene::{
    Billboard, BillboardInstance, Geometry, Lod, Material, NodeKind, PagedLod, RangeMode,
    SceneGraph, SceneNode, SourceArray, StateSet, StateSetKey, Transform,
};
use crate::foundation::math::{DMat4, Vec3};
use crate::shader::GlslShaderGenerator;

/// Context that refuses every compile, for degradation tests
struct FailingGpuContext;

impl GpuContext for FailingGpuContext {
    fn compile_shader(
        &self,
        _stage: vk::ShaderStageFlags,
        _source: &str,
    ) -> Result<Arc<ShaderModule>, ShaderCompileError> {
        Err(ShaderCompileError::Compile("no device".to_string()))
    }
}

fn triangle() -> Geometry {
    Geometry {
        vertices: Some(SourceArray::from_vec3s(&[
            [0.0, 0.0, 0.0],
            [1.0, 0.0, 0.0],
            [0.0, 1.0, 0.0],
        ])),
        indices: Some(SourceArray::from_ushorts(&[0, 1, 2])),
        ..Geometry::default()
    }
}

fn material_state(graph: &mut SceneGraph) -> StateSetKey {
    let mut state = StateSet::new();
    state.material = Some(Material::default());
    graph.add_state_set(state)
}

fn convert_with_defaults(graph: &SceneGraph, root: crate::scene::NodeKey) -> Option<Arc<RenderNode>> {
    let _ = env_logger::builder().is_test(true).try_init();
    convert_scene(
        graph,
        root,
        &ConvertSettings::default(),
        &GlslShaderGenerator,
        &OfflineGpuContext,
    )
}

#[test]
fn test_diamond_source_converts_to_shared_target() {
    let mut graph = SceneGraph::new();
    let shared = graph.add_geometry(triangle());
    let left = graph.add_group(vec![shared]);
    let right = graph.add_group(vec![shared]);
    let root = graph.add_group(vec![left, right]);

    let converted = convert_with_defaults(&graph, root).unwrap();
    let RenderNode::Group(top) = converted.as_ref() else {
        panic!("expected group root");
    };
    assert_eq!(top.children.len(), 2);

    let child_of = |node: &RenderNode| -> Arc<RenderNode> {
        let RenderNode::Group(group) = node else {
            panic!("expected group parent");
        };
        Arc::clone(&group.children[0])
    };
    let via_left = child_of(&top.children[0]);
    let via_right = child_of(&top.children[1]);

    // One converted instance, shared by reference through both parents.
    assert!(Arc::ptr_eq(&via_left, &via_right));
}

#[test]
fn test_geometry_binds_pipeline_before_descriptor_set() {
    let mut graph = SceneGraph::new();
    let state = material_state(&mut graph);
    let geometry = graph.add_node(SceneNode::with_state(
        NodeKind::Geometry(triangle()),
        state,
    ));

    let converted = convert_with_defaults(&graph, geometry).unwrap();
    let RenderNode::StateGroup(state_group) = converted.as_ref() else {
        panic!("expected state group");
    };

    assert_eq!(state_group.state_commands.len(), 2);
    assert!(matches!(
        state_group.state_commands[0],
        StateCommand::BindGraphicsPipeline(_)
    ));
    assert!(matches!(
        state_group.state_commands[1],
        StateCommand::BindDescriptorSet(_)
    ));
    assert_eq!(state_group.children.len(), 1);
    assert!(matches!(
        state_group.children[0].as_ref(),
        RenderNode::Geometry(_)
    ));
}

#[test]
fn test_failed_pipeline_degrades_to_bare_state_group() {
    let mut graph = SceneGraph::new();
    let state = material_state(&mut graph);
    let geometry = graph.add_node(SceneNode::with_state(
        NodeKind::Geometry(triangle()),
        state,
    ));

    let converted = convert_scene(
        &graph,
        geometry,
        &ConvertSettings::default(),
        &GlslShaderGenerator,
        &FailingGpuContext,
    )
    .unwrap();

    let RenderNode::StateGroup(state_group) = converted.as_ref() else {
        panic!("expected state group");
    };
    // No pipeline, and therefore no descriptor set either; the geometry
    // itself still converts.
    assert!(state_group.state_commands.is_empty());
    assert!(matches!(
        state_group.children[0].as_ref(),
        RenderNode::Geometry(_)
    ));
}

#[test]
fn test_lod_children_emitted_highest_detail_first() {
    let mut graph = SceneGraph::new();
    let children = vec![
        graph.add_geometry(triangle()),
        graph.add_geometry(triangle()),
        graph.add_geometry(triangle()),
    ];
    // Pixel-size ranges chosen to produce ratios 0.1, 0.5, 0.3.
    let lod = graph.add_node(SceneNode::new(NodeKind::Lod(Lod {
        children,
        ranges: vec![(108.0, 0.0), (540.0, 0.0), (324.0, 0.0)],
        range_mode: RangeMode::PixelSizeOnScreen,
        ..Lod::default()
    })));

    let converted = convert_with_defaults(&graph, lod).unwrap();
    let RenderNode::Lod(lod) = converted.as_ref() else {
        panic!("expected lod node");
    };

    let ratios: Vec<f64> = lod
        .children
        .iter()
        .map(|child| child.minimum_screen_height_ratio)
        .collect();
    assert_eq!(ratios.len(), 3);
    assert_relative_eq!(ratios[0], 0.5);
    assert_relative_eq!(ratios[1], 0.3);
    assert_relative_eq!(ratios[2], 0.1);
}

#[test]
fn test_lod_converts_no_more_children_than_ranges() {
    let mut graph = SceneGraph::new();
    let children = vec![
        graph.add_geometry(triangle()),
        graph.add_geometry(triangle()),
    ];
    let lod = graph.add_node(SceneNode::new(NodeKind::Lod(Lod {
        children,
        ranges: vec![(108.0, 0.0)],
        range_mode: RangeMode::PixelSizeOnScreen,
        ..Lod::default()
    })));

    let converted = convert_with_defaults(&graph, lod).unwrap();
    let RenderNode::Lod(lod) = converted.as_ref() else {
        panic!("expected lod node");
    };
    assert_eq!(lod.children.len(), 1);
}

#[test]
fn test_paged_lod_scales_descriptor_pools_for_paging() {
    fn build(graph: &mut SceneGraph) -> crate::scene::NodeKey {
        let state_a = material_state(graph);
        let state_b = material_state(graph);
        let coarse = graph.add_node(SceneNode::with_state(
            NodeKind::Geometry(triangle()),
            state_a,
        ));
        let fine = graph.add_node(SceneNode::with_state(
            NodeKind::Geometry(triangle()),
            state_b,
        ));
        graph.add_node(SceneNode::new(NodeKind::PagedLod(PagedLod {
            children: vec![coarse, fine],
            ranges: vec![(108.0, 0.0), (540.0, 0.0)],
            file_names: vec![String::new(), "tile_l3.sub".to_string()],
            range_mode: RangeMode::PixelSizeOnScreen,
            ..PagedLod::default()
        })))
    }

    let unscaled = {
        let mut graph = SceneGraph::new();
        let root = build(&mut graph);
        convert_with_defaults(&graph, root).unwrap()
    };
    let RenderNode::PagedLod(unscaled) = unscaled.as_ref() else {
        panic!("expected paged lod");
    };
    assert_eq!(unscaled.num_descriptor_sets, 2);

    // A tile at depth 2 of 4 with a generous external bound anticipates
    // min(4^0 + 4^1, 100) + 1 = 6 tiles.
    let settings = ConvertSettings {
        tile_level: 2,
        max_tile_level: 4,
        num_tiles_below: 100,
        ..ConvertSettings::default()
    };
    let scaled = {
        let mut graph = SceneGraph::new();
        let root = build(&mut graph);
        convert_scene(&graph, root, &settings, &GlslShaderGenerator, &OfflineGpuContext).unwrap()
    };
    let RenderNode::PagedLod(scaled) = scaled.as_ref() else {
        panic!("expected paged lod");
    };

    assert_eq!(scaled.num_descriptor_sets, unscaled.num_descriptor_sets * 6);
    assert_eq!(
        scaled.descriptor_pool_sizes.len(),
        unscaled.descriptor_pool_sizes.len()
    );
    for (scaled_size, unscaled_size) in scaled
        .descriptor_pool_sizes
        .iter()
        .zip(&unscaled.descriptor_pool_sizes)
    {
        assert_eq!(scaled_size.ty, unscaled_size.ty);
        assert_eq!(
            scaled_size.descriptor_count,
            unscaled_size.descriptor_count * 6
        );
    }

    // Two declared slots install both fixed children, highest detail
    // first, and the high-detail slot's external reference is remapped.
    assert!(scaled.children[0].is_some());
    assert!(scaled.children[1].is_some());
    let first = scaled.children[0].as_ref().unwrap();
    let second = scaled.children[1].as_ref().unwrap();
    assert!(first.minimum_screen_height_ratio > second.minimum_screen_height_ratio);
    assert_eq!(
        scaled.filename.as_ref().unwrap().to_str().unwrap(),
        "tile_l3.vkb"
    );
}

#[test]
fn test_paged_lod_without_ranges_produces_nothing() {
    let mut graph = SceneGraph::new();
    let child = graph.add_geometry(triangle());
    let plod = graph.add_node(SceneNode::new(NodeKind::PagedLod(PagedLod {
        children: vec![child],
        ..PagedLod::default()
    })));

    assert!(convert_with_defaults(&graph, plod).is_none());
}

#[test]
fn test_billboard_single_child_is_promoted() {
    let mut graph = SceneGraph::new();
    let geometry = graph.add_geometry(triangle());
    let billboard = graph.add_node(SceneNode::new(NodeKind::Billboard(Billboard {
        drawables: vec![BillboardInstance {
            geometry,
            position: Vec3::new(1.0, 2.0, 3.0),
        }],
    })));

    let converted = convert_with_defaults(&graph, billboard).unwrap();
    // Not wrapped in a redundant single-child group.
    assert!(matches!(converted.as_ref(), RenderNode::StateGroup(_)));
}

#[test]
fn test_billboard_with_nine_children_is_discarded() {
    let mut graph = SceneGraph::new();
    let geometry = graph.add_geometry(triangle());
    let drawables = (0..9)
        .map(|i| BillboardInstance {
            geometry,
            position: Vec3::new(i as f32, 0.0, 0.0),
        })
        .collect();
    let billboard = graph.add_node(SceneNode::new(NodeKind::Billboard(Billboard {
        drawables,
    })));

    // Per-instance transform mode produces one child per drawable.
    let settings = ConvertSettings {
        billboard_transform: true,
        ..ConvertSettings::default()
    };
    let converted = convert_scene(
        &graph,
        billboard,
        &settings,
        &GlslShaderGenerator,
        &OfflineGpuContext,
    );
    assert!(converted.is_none());
}

#[test]
fn test_billboard_merges_shared_geometry_into_instances() {
    let mut graph = SceneGraph::new();
    let geometry = graph.add_geometry(triangle());
    let billboard = graph.add_node(SceneNode::new(NodeKind::Billboard(Billboard {
        drawables: vec![
            BillboardInstance {
                geometry,
                position: Vec3::new(-3.0, 0.0, 0.0),
            },
            BillboardInstance {
                geometry,
                position: Vec3::new(3.0, 0.0, 0.0),
            },
        ],
    })));

    let converted = convert_with_defaults(&graph, billboard).unwrap();
    // Two drawables of one geometry merge into a single instanced child.
    let RenderNode::StateGroup(state_group) = converted.as_ref() else {
        panic!("expected promoted state group");
    };
    let RenderNode::Geometry(geometry) = state_group.children[0].as_ref() else {
        panic!("expected retained geometry");
    };
    let translate = geometry
        .arrays
        .iter()
        .find(|a| a.rate == vk::VertexInputRate::INSTANCE)
        .unwrap();
    assert_eq!(translate.data.len(), 2);
}

#[test]
fn test_billboard_mask_resets_for_following_siblings() {
    let mut graph = SceneGraph::new();
    let instanced = graph.add_geometry(triangle());
    let billboard = graph.add_node(SceneNode::new(NodeKind::Billboard(Billboard {
        drawables: vec![BillboardInstance {
            geometry: instanced,
            position: Vec3::zeros(),
        }],
    })));
    let plain = graph.add_geometry(triangle());
    let root = graph.add_group(vec![billboard, plain]);

    let converted = convert_with_defaults(&graph, root).unwrap();
    let RenderNode::Group(group) = converted.as_ref() else {
        panic!("expected group root");
    };

    let vertex_source = |node: &RenderNode| -> String {
        let RenderNode::StateGroup(state_group) = node else {
            panic!("expected state group");
        };
        let StateCommand::BindGraphicsPipeline(bind) = &state_group.state_commands[0] else {
            panic!("expected pipeline binding");
        };
        bind.pipeline.shader_stages[0].source.clone()
    };

    assert!(vertex_source(&group.children[0]).contains("#define BILLBOARD"));
    assert!(!vertex_source(&group.children[1]).contains("#define BILLBOARD"));
}

#[test]
fn test_transform_matrix_is_transposed() {
    let mut graph = SceneGraph::new();
    let geometry = graph.add_geometry(triangle());
    let mut matrix = DMat4::identity();
    matrix[(3, 0)] = 5.0;
    let transform = graph.add_node(SceneNode::new(NodeKind::Transform(Transform {
        matrix,
        children: vec![geometry],
    })));

    let converted = convert_with_defaults(&graph, transform).unwrap();
    let RenderNode::Transform(transform) = converted.as_ref() else {
        panic!("expected transform");
    };
    assert_relative_eq!(transform.matrix[(0, 3)], 5.0);
    assert!(!transform.subgraph_requires_local_frustum);
}

#[test]
fn test_transform_flags_lod_descendants() {
    let mut graph = SceneGraph::new();
    let geometry = graph.add_geometry(triangle());
    let lod = graph.add_node(SceneNode::new(NodeKind::Lod(Lod {
        children: vec![geometry],
        ranges: vec![(108.0, 0.0)],
        range_mode: RangeMode::PixelSizeOnScreen,
        ..Lod::default()
    })));
    let inner_group = graph.add_group(vec![lod]);
    let transform = graph.add_node(SceneNode::new(NodeKind::Transform(Transform {
        matrix: DMat4::identity(),
        children: vec![inner_group],
    })));

    let converted = convert_with_defaults(&graph, transform).unwrap();
    let RenderNode::Transform(transform) = converted.as_ref() else {
        panic!("expected transform");
    };
    assert!(transform.subgraph_requires_local_frustum);
}

#[test]
fn test_coordinate_system_is_tagged() {
    let mut graph = SceneGraph::new();
    let geometry = graph.add_geometry(triangle());
    let cs = graph.add_node(SceneNode::new(NodeKind::CoordinateSystem(
        crate::scene::Group {
            children: vec![geometry],
        },
    )));

    let converted = convert_with_defaults(&graph, cs).unwrap();
    let RenderNode::Group(group) = converted.as_ref() else {
        panic!("expected group");
    };
    assert_eq!(group.class, Some("CoordinateSystemNode"));
    assert_eq!(group.children.len(), 1);
}

#[test]
fn test_terrain_tile_is_transparent() {
    let mut graph = SceneGraph::new();
    let geometry = graph.add_geometry(triangle());
    let tile = graph.add_node(SceneNode::new(NodeKind::TerrainTile(crate::scene::Group {
        children: vec![geometry],
    })));

    // The tile contributes no node; its child's conversion stands in.
    let converted = convert_with_defaults(&graph, tile).unwrap();
    assert!(matches!(converted.as_ref(), RenderNode::StateGroup(_)));

    let empty_tile = graph.add_node(SceneNode::new(NodeKind::TerrainTile(
        crate::scene::Group::default(),
    )));
    assert!(convert_with_defaults(&graph, empty_tile).is_none());
}

#[test]
fn test_filename_remapping_is_memoized() {
    let graph = SceneGraph::new();
    let settings = ConvertSettings::default();
    let generator = GlslShaderGenerator;
    let gpu = OfflineGpuContext;
    let mut converter = SceneConverter::new(&graph, &settings, &generator, &gpu);

    let first = converter.map_file_name("tiles/level0.sub");
    assert_eq!(first.to_str().unwrap(), "tiles/level0.vkb");

    let second = converter.map_file_name("tiles/level0.sub");
    assert_eq!(first, second);
}

#[test]
fn test_commands_target_produces_command_lists() {
    let mut graph = SceneGraph::new();
    let geometry = graph.add_geometry(triangle());

    let settings = ConvertSettings {
        geometry_target: GeometryTarget::Commands,
        ..ConvertSettings::default()
    };
    let converted = convert_scene(
        &graph,
        geometry,
        &settings,
        &GlslShaderGenerator,
        &OfflineGpuContext,
    )
    .unwrap();

    let RenderNode::StateGroup(state_group) = converted.as_ref() else {
        panic!("expected state group");
    };
    assert!(matches!(
        state_group.children[0].as_ref(),
        RenderNode::Commands(_)
    ));
}

#[test]
fn test_settings_parse_from_toml() {
    let settings = ConvertSettings::from_toml(
        r#"
extension = "bin"
billboard_transform = true
geometry_target = "commands"
supported_shader_mode_mask = 3
"#,
    )
    .unwrap();

    assert_eq!(settings.extension, "bin");
    assert!(settings.billboard_transform);
    assert_eq!(settings.geometry_target, GeometryTarget::Commands);
    assert_eq!(settings.supported_shader_mode_mask.bits(), 3);
    // Unset fields keep their defaults.
    assert_eq!(settings.num_tiles_below, 0);
    assert!(settings.supported_geometry_attributes.is_all());

    assert!(ConvertSettings::from_toml("extension = 3").is_err());
}

#[test]
fn test_supported_mask_filters_pipeline_state() {
    let mut graph = SceneGraph::new();
    let mut state = StateSet::new();
    state.lighting = Some(true);
    state.material = Some(Material::default());
    let key = graph.add_state_set(state);
    let geometry = graph.add_node(SceneNode::with_state(
        NodeKind::Geometry(triangle()),
        key,
    ));

    // Lighting is masked out as unsupported; material survives.
    let settings = ConvertSettings {
        supported_shader_mode_mask: crate::shader::ShaderModeMask::MATERIAL,
        ..ConvertSettings::default()
    };
    let converted = convert_scene(
        &graph,
        geometry,
        &settings,
        &GlslShaderGenerator,
        &OfflineGpuContext,
    )
    .unwrap();

    let RenderNode::StateGroup(state_group) = converted.as_ref() else {
        panic!("expected state group");
    };
    let StateCommand::BindGraphicsPipeline(bind) = &state_group.state_commands[0] else {
        panic!("expected pipeline binding");
    };
    let source = &bind.pipeline.shader_stages[1].source;
    assert!(source.contains("#define MATERIAL"));
    assert!(!source.contains("#define LIGHTING"));
}
