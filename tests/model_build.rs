use std::rc::Rc;

use gltf_stage::device::{CompileStage, DrawCommand};
use gltf_stage::error::{ConfigurationError, ResourceKind};
use gltf_stage::model::Diagnostic;
use gltf_stage::scene::{
    AccessorType, BufferTarget, Image, MinFilter, MorphTarget, Sampler, SceneRoot, Semantic,
};
use gltf_stage::shader::{Define, Shader};
use gltf_stage::{BuildOptions, Error};

mod common;

use common::{broken_image, headless_app, png_image, rgba_pixels, textured_scene, SceneBuilder};

#[test]
fn missing_position_allocates_nothing() {
    let (device, mut app) = headless_app();
    let mut builder = SceneBuilder::new();
    let complete = builder.triangle(&[Semantic::Position, Semantic::Normal]);
    builder.mesh_node(vec![complete]);
    let no_position = builder.triangle(&[Semantic::Normal]);
    builder.mesh_node(vec![no_position]);
    let texture = builder.texture(rgba_pixels(2, 2), None);
    builder.textured_material(texture);

    let err = app
        .build_model(builder.build(), &BuildOptions::default())
        .unwrap_err();
    assert!(matches!(
        err,
        Error::Configuration(ConfigurationError::MissingPosition {
            mesh: 1,
            primitive: 0
        })
    ));
    assert_eq!(device.live_buffers(), 0);
    assert_eq!(device.live_textures(), 0);
    assert_eq!(device.live_vertex_arrays(), 0);
    assert_eq!(device.live_programs(), 0);
    assert_eq!(device.buffer_uploads(), 0);
}

#[test]
fn identical_flags_share_one_program() {
    let (device, mut app) = headless_app();
    let mut builder = SceneBuilder::new();
    let a = builder.triangle(&[Semantic::Position, Semantic::Normal]);
    let b = builder.triangle(&[Semantic::Position, Semantic::Normal]);
    builder.mesh_node(vec![a, b]);
    let c = builder.triangle(&[Semantic::Normal, Semantic::Position]);
    builder.mesh_node(vec![c]);
    let plain = builder.triangle(&[Semantic::Position]);
    builder.mesh_node(vec![plain]);

    let model = app
        .build_model(builder.build(), &BuildOptions::default())
        .unwrap();
    let first = model.primitives(0)[0].program();
    assert!(Rc::ptr_eq(first, model.primitives(0)[1].program()));
    assert!(Rc::ptr_eq(first, model.primitives(1)[0].program()));
    assert!(!Rc::ptr_eq(first, model.primitives(2)[0].program()));
    assert!(first.defines().contains(&[Define::HasNormal]));
    assert_eq!(device.program_links(), 2);
    assert_eq!(app.programs().len(), 2);
}

#[test]
fn second_model_reuses_cached_programs() {
    let (device, mut app) = headless_app();
    let mut builder = SceneBuilder::new();
    let primitive = builder.triangle(&[Semantic::Position, Semantic::TexCoord0]);
    builder.mesh_node(vec![primitive]);
    let scene = builder.build();

    let first = app
        .build_model(scene.clone(), &BuildOptions::default())
        .unwrap();
    let second = app.build_model(scene, &BuildOptions::default()).unwrap();
    assert!(Rc::ptr_eq(
        first.primitives(0)[0].program(),
        second.primitives(0)[0].program()
    ));
    assert_eq!(device.program_links(), 1);
}

#[test]
fn every_accessor_with_data_is_uploaded_once() {
    let (device, mut app) = headless_app();
    let mut builder = SceneBuilder::new();
    let mut primitive = builder.triangle(&[Semantic::Position, Semantic::Normal]);
    primitive.indices = Some(builder.indices(&[0, 1, 2], Some(BufferTarget::ElementArrayBuffer)));
    builder.mesh_node(vec![primitive]);
    builder.positions();
    builder.empty_accessor(AccessorType::Vec3);
    let scene = builder.build();

    let first = app
        .build_model(scene.clone(), &BuildOptions::default())
        .unwrap();
    assert_eq!(device.buffer_uploads(), 4);
    assert_eq!(device.live_buffers(), 4);
    assert!(first.buffer(4).is_none());

    // Building again makes an independent model with its own buffers.
    let second = app.build_model(scene, &BuildOptions::default()).unwrap();
    assert_eq!(device.buffer_uploads(), 8);
    assert_ne!(first.buffer(0), second.buffer(0));

    drop(first);
    assert_eq!(device.live_buffers(), 4);
    drop(second);
    assert_eq!(device.live_buffers(), 0);
    assert_eq!(device.live_vertex_arrays(), 0);
}

#[test]
fn buffers_get_the_declared_or_inferred_role() {
    let (device, mut app) = headless_app();
    let mut builder = SceneBuilder::new();
    let mut primitive = builder.triangle(&[Semantic::Position]);
    let indices = builder.indices(&[0, 1, 2], None);
    primitive.indices = Some(indices);
    builder.mesh_node(vec![primitive]);

    let model = app
        .build_model(builder.build(), &BuildOptions::default())
        .unwrap();
    assert_eq!(
        model.diagnostics(),
        &[Diagnostic::UndeclaredBufferTarget {
            accessor: indices,
            assumed: BufferTarget::ElementArrayBuffer,
        }]
    );
    let index_buffer = model.buffer(indices).unwrap();
    assert_eq!(
        device.buffer(index_buffer),
        Some((BufferTarget::ElementArrayBuffer, 6))
    );
    let position_buffer = model.buffer(0).unwrap();
    assert_eq!(
        device.buffer(position_buffer),
        Some((BufferTarget::ArrayBuffer, 36))
    );
    assert_eq!(
        model.primitives(0)[0].draw_command(),
        &DrawCommand::Indexed {
            mode: Default::default(),
            count: 3,
            index_type: gltf_stage::scene::ComponentType::U16,
        }
    );
}

#[test]
fn mip_chain_follows_the_sampler() {
    let (device, mut app) = headless_app();
    let mut builder = SceneBuilder::new();
    let mut primitive = builder.triangle(&[Semantic::Position, Semantic::TexCoord0]);
    let trilinear = builder.texture(
        rgba_pixels(4, 4),
        Some(Sampler {
            min_filter: Some(MinFilter::LinearMipmapLinear),
            ..Default::default()
        }),
    );
    let linear = builder.texture(
        rgba_pixels(4, 4),
        Some(Sampler {
            min_filter: Some(MinFilter::Linear),
            ..Default::default()
        }),
    );
    let unspecified = builder.texture(png_image(8, 2), None);
    primitive.material = Some(builder.textured_material(trilinear));
    builder.mesh_node(vec![primitive]);

    let model = app
        .build_model(builder.build(), &BuildOptions::default())
        .unwrap();
    let record = |texture| device.texture(model.texture(texture).unwrap()).unwrap();
    assert_eq!(record(trilinear).mip_levels, 3);
    assert!(record(trilinear).descriptor.generate_mipmaps);
    assert_eq!(record(linear).mip_levels, 1);
    assert!(!record(linear).descriptor.generate_mipmaps);
    assert_eq!(record(unspecified).mip_levels, 4);
    assert_eq!(
        (record(unspecified).descriptor.width, record(unspecified).descriptor.height),
        (8, 2)
    );
}

#[test]
fn failed_texture_releases_the_earlier_ones() {
    let (device, mut app) = headless_app();
    let images = vec![
        rgba_pixels(2, 2),
        png_image(2, 2),
        broken_image(),
        rgba_pixels(2, 2),
        rgba_pixels(2, 2),
    ];
    let err = app
        .build_model(textured_scene(images), &BuildOptions::default())
        .unwrap_err();
    let Error::Decode(decode) = err else {
        panic!("expected a decode error, got {err}");
    };
    assert_eq!(decode.texture, 2);
    assert_eq!(device.texture_uploads(), 2);
    assert_eq!(device.live_textures(), 0);
    assert_eq!(device.live_buffers(), 0);
    assert_eq!(device.live_vertex_arrays(), 0);
}

#[test]
fn short_pixel_data_is_a_decode_error() {
    let (device, mut app) = headless_app();
    let images = vec![Image::Pixels {
        width: 4,
        height: 4,
        format: gltf_stage::scene::PixelFormat::R8G8B8,
        data: vec![0; 10],
    }];
    let err = app
        .build_model(textured_scene(images), &BuildOptions::default())
        .unwrap_err();
    assert!(matches!(err, Error::Decode(_)));
    assert_eq!(device.live_buffers(), 0);
}

#[test]
fn failed_buffer_upload_releases_the_earlier_ones() {
    let (device, mut app) = headless_app();
    let mut builder = SceneBuilder::new();
    let primitive = builder.triangle(&[
        Semantic::Position,
        Semantic::Normal,
        Semantic::TexCoord0,
        Semantic::TexCoord1,
    ]);
    builder.mesh_node(vec![primitive]);
    device.set_buffer_budget(Some(2));

    let err = app
        .build_model(builder.build(), &BuildOptions::default())
        .unwrap_err();
    let Error::Resource(resource) = err else {
        panic!("expected a resource error, got {err}");
    };
    assert_eq!(resource.kind, ResourceKind::Buffer);
    assert_eq!(resource.index, 2);
    assert_eq!(device.live_buffers(), 0);
    assert_eq!(device.live_textures(), 0);
}

#[test]
fn compile_failure_names_stage_and_flags() {
    let (device, mut app) = headless_app();
    let scene = textured_scene(vec![rgba_pixels(2, 2)]);
    device.fail_compilation(Some(CompileStage::Fragment));

    let err = app.build_model(scene, &BuildOptions::default()).unwrap_err();
    let Error::Compile(compile) = err else {
        panic!("expected a compile error, got {err}");
    };
    assert_eq!(compile.stage, CompileStage::Fragment);
    assert!(compile
        .defines
        .contains(&[Define::HasTexCoord0, Define::HasBaseColorTexture]));
    assert!(!compile.log.is_empty());
    assert_eq!(device.live_buffers(), 0);
    assert_eq!(device.live_textures(), 0);
    assert_eq!(device.live_vertex_arrays(), 0);
    assert!(app.programs().is_empty());
}

#[test]
fn morph_targets_bind_after_their_base_slot() {
    let (device, mut app) = headless_app();
    let mut builder = SceneBuilder::new();
    let mut primitive = builder.triangle(&[Semantic::Position, Semantic::Normal]);
    let targets = (0..2)
        .map(|_| MorphTarget {
            position: Some(builder.positions()),
            normal: Some(builder.normals()),
            tangent: None,
        })
        .collect();
    primitive.targets = targets;
    builder.mesh_node(vec![primitive]);

    let model = app
        .build_model(builder.build(), &BuildOptions::default())
        .unwrap();
    let binding = &model.primitives(0)[0];
    let defines = binding.program().defines();
    assert!(defines.contains(&[
        Define::MorphTargetCount(2),
        Define::HasMorphPosition,
        Define::HasMorphNormal,
    ]));
    assert!(!defines.contains(&[Define::HasMorphTangent]));

    let layout = device.vertex_array(binding.vertex_array()).unwrap();
    let slots = {
        let mut slots = layout.attributes.iter().map(|a| a.slot).collect::<Vec<_>>();
        slots.sort();
        slots
    };
    assert_eq!(slots, vec![0, 1, 7, 8, 10, 11]);
    assert_eq!(layout.attribute(8).map(|a| a.buffer), model.buffer(4));
}

#[test]
fn too_many_morph_targets_is_rejected() {
    let (device, mut app) = headless_app();
    let mut builder = SceneBuilder::new();
    let mut primitive = builder.triangle(&[Semantic::Position]);
    primitive.targets = (0..4)
        .map(|_| MorphTarget {
            position: Some(builder.positions()),
            ..Default::default()
        })
        .collect();
    builder.mesh_node(vec![primitive]);

    let err = app
        .build_model(builder.build(), &BuildOptions::default())
        .unwrap_err();
    assert!(matches!(
        err,
        Error::Configuration(ConfigurationError::TooManyMorphTargets {
            mesh: 0,
            count: 4,
            ..
        })
    ));
    assert_eq!(device.live_buffers(), 0);
}

#[test]
fn clear_cache_drops_scene_data_but_keeps_the_model_drawable() {
    let (device, mut app) = headless_app();
    let scene = textured_scene(vec![rgba_pixels(2, 2)]);
    let options = BuildOptions {
        clear_cache: true,
        ..Default::default()
    };
    let model = app.build_model(scene, &options).unwrap();
    assert!(model.scene().buffers.iter().all(Vec::is_empty));
    assert!(model.scene().images.iter().all(|image| *image == Image::Empty));
    assert_eq!(model.scene().accessors.len(), 2);

    app.spawn(&model, None).unwrap();
    app.render();
    assert_eq!(device.draws().len(), 1);
}

#[test]
fn option_shaders_and_defines_apply_to_every_variant() {
    let (device, mut app) = headless_app();
    let mut builder = SceneBuilder::new();
    let primitive = builder.triangle(&[Semantic::Position]);
    builder.mesh_node(vec![primitive]);
    let fragment = "#version 300 es\nprecision mediump float;\nout vec4 color;\nvoid main() { color = vec4(1.0); }\n";
    let options = BuildOptions {
        shaders: vec![Shader::fragment(fragment)],
        defines: [Define::custom("USE_FLAT_SHADING")].into_iter().collect(),
        ..Default::default()
    };

    let model = app.build_model(builder.build(), &options).unwrap();
    let program = model.primitives(0)[0].program();
    assert!(program.defines().contains(&[Define::custom("USE_FLAT_SHADING")]));
    let (vertex, linked_fragment) = device.program_sources(program.handle()).unwrap();
    assert!(linked_fragment.contains("color = vec4(1.0)"));
    assert!(linked_fragment.starts_with("#version 300 es\n#define USE_FLAT_SHADING\n"));
    assert!(vertex.contains("#define USE_FLAT_SHADING"));
    assert!(vertex.contains("projViewMatrix"));
}

#[test]
fn scene_root_listing_a_child_allocates_nothing() {
    let (device, mut app) = headless_app();
    let mut builder = SceneBuilder::new();
    let parent_primitive = builder.triangle(&[Semantic::Position]);
    let parent = builder.mesh_node(vec![parent_primitive]);
    let child_primitive = builder.triangle(&[Semantic::Position]);
    let child = builder.mesh_node(vec![child_primitive]);
    builder.scene.nodes[parent].children.push(child);
    builder.scene.roots.push(SceneRoot {
        name: None,
        nodes: vec![parent, child],
    });

    let err = app
        .build_model(builder.build(), &BuildOptions::default())
        .unwrap_err();
    assert!(matches!(
        err,
        Error::Configuration(ConfigurationError::InvalidNodeHierarchy { node }) if node == child
    ));
    assert_eq!(device.live_buffers(), 0);
    assert_eq!(device.live_vertex_arrays(), 0);
    assert_eq!(device.live_programs(), 0);
}
