//! WGSL sources
//!
//! Binding slots are fixed across every pipeline:
//! group 0 frame data (0 frame uniform, 1..=3 cascade depth maps, 4 shadow
//! comparison sampler, 5 skybox cube map, 6 skybox sampler), group 1 the
//! per-draw uniform, group 2 the diffuse texture (0) and its sampler (1).
//! The shadow pipeline only binds the per-draw uniform, at group 0.

/// Blinn-Phong forward shading with cascaded shadow lookup. Used by both the
/// opaque and the transparent pipelines.
pub const SCENE_SHADER: &str = r#"
struct FrameUniforms {
    view: mat4x4<f32>,
    projection: mat4x4<f32>,
    light_direction: vec4<f32>,
    light_intensity: vec4<f32>,
    camera_position: vec4<f32>,
    cascade_far: vec4<f32>,
}

struct DrawUniforms {
    model: mat4x4<f32>,
    model_view: mat4x4<f32>,
    mvp: mat4x4<f32>,
    light_mvp: array<mat4x4<f32>, 3>,
    normal: mat4x4<f32>,
    ka: vec4<f32>,
    kd: vec4<f32>,
    ks: vec4<f32>,
    shininess: f32,
    alpha: f32,
    cascade: u32,
    padding: u32,
}

struct VertexInput {
    @location(0) position: vec3<f32>,
    @location(1) normal: vec3<f32>,
    @location(2) uv: vec2<f32>,
}

struct VertexOutput {
    @builtin(position) clip_position: vec4<f32>,
    @location(0) world_position: vec3<f32>,
    @location(1) world_normal: vec3<f32>,
    @location(2) uv: vec2<f32>,
    @location(3) view_depth: f32,
    @location(4) light_position0: vec4<f32>,
    @location(5) light_position1: vec4<f32>,
    @location(6) light_position2: vec4<f32>,
}

@group(0) @binding(0) var<uniform> frame: FrameUniforms;
@group(0) @binding(1) var shadow_map0: texture_depth_2d;
@group(0) @binding(2) var shadow_map1: texture_depth_2d;
@group(0) @binding(3) var shadow_map2: texture_depth_2d;
@group(0) @binding(4) var shadow_sampler: sampler_comparison;
@group(1) @binding(0) var<uniform> draw: DrawUniforms;
@group(2) @binding(0) var diffuse_texture: texture_2d<f32>;
@group(2) @binding(1) var diffuse_sampler: sampler;

@vertex
fn vs_main(input: VertexInput) -> VertexOutput {
    var output: VertexOutput;
    let position = vec4<f32>(input.position, 1.0);
    output.clip_position = draw.mvp * position;
    output.world_position = (draw.model * position).xyz;
    output.world_normal = (draw.normal * vec4<f32>(input.normal, 0.0)).xyz;
    output.uv = input.uv;
    output.view_depth = -(draw.model_view * position).z;
    output.light_position0 = draw.light_mvp[0] * position;
    output.light_position1 = draw.light_mvp[1] * position;
    output.light_position2 = draw.light_mvp[2] * position;
    return output;
}

// 3x3 percentage-closer filtering. Fragments outside the map are lit.
fn filtered_shadow(shadow_map: texture_depth_2d, light_position: vec4<f32>) -> f32 {
    let ndc = light_position.xyz / light_position.w;
    let uv = vec2<f32>(ndc.x * 0.5 + 0.5, 0.5 - ndc.y * 0.5);
    if (any(uv < vec2<f32>(0.0)) || any(uv > vec2<f32>(1.0)) || ndc.z > 1.0) {
        return 1.0;
    }
    let texel = 1.0 / vec2<f32>(textureDimensions(shadow_map));
    var lit = 0.0;
    for (var x = -1; x <= 1; x++) {
        for (var y = -1; y <= 1; y++) {
            let offset = vec2<f32>(f32(x), f32(y)) * texel;
            lit += textureSampleCompareLevel(shadow_map, shadow_sampler, uv + offset, ndc.z);
        }
    }
    return lit / 9.0;
}

fn shadow_visibility(input: VertexOutput) -> f32 {
    if (frame.cascade_far.w < 0.5) {
        return 1.0;
    }
    if (input.view_depth < frame.cascade_far.x) {
        return filtered_shadow(shadow_map0, input.light_position0);
    }
    if (input.view_depth < frame.cascade_far.y) {
        return filtered_shadow(shadow_map1, input.light_position1);
    }
    if (input.view_depth < frame.cascade_far.z) {
        return filtered_shadow(shadow_map2, input.light_position2);
    }
    return 1.0;
}

@fragment
fn fs_main(input: VertexOutput) -> @location(0) vec4<f32> {
    let texel = textureSample(diffuse_texture, diffuse_sampler, input.uv);

    let n = normalize(input.world_normal);
    let l = normalize(-frame.light_direction.xyz);
    let v = normalize(frame.camera_position.xyz - input.world_position);
    let h = normalize(l + v);

    let lambert = max(dot(n, l), 0.0);
    let specular = select(0.0, pow(max(dot(n, h), 0.0), max(draw.shininess, 1.0)), lambert > 0.0);
    let visibility = shadow_visibility(input);

    let ambient = draw.ka.rgb * texel.rgb;
    let direct = draw.kd.rgb * texel.rgb * lambert + draw.ks.rgb * specular;
    let color = ambient + visibility * frame.light_intensity.rgb * direct;
    return vec4<f32>(color, draw.alpha * texel.a);
}
"#;

/// Depth-only caster pass; `draw.cascade` selects the light matrix.
pub const SHADOW_SHADER: &str = r#"
struct DrawUniforms {
    model: mat4x4<f32>,
    model_view: mat4x4<f32>,
    mvp: mat4x4<f32>,
    light_mvp: array<mat4x4<f32>, 3>,
    normal: mat4x4<f32>,
    ka: vec4<f32>,
    kd: vec4<f32>,
    ks: vec4<f32>,
    shininess: f32,
    alpha: f32,
    cascade: u32,
    padding: u32,
}

@group(0) @binding(0) var<uniform> draw: DrawUniforms;

@vertex
fn vs_main(@location(0) position: vec3<f32>) -> @builtin(position) vec4<f32> {
    return draw.light_mvp[draw.cascade] * vec4<f32>(position, 1.0);
}
"#;

/// Cube-mapped sky drawn at the far plane.
pub const SKYBOX_SHADER: &str = r#"
struct DrawUniforms {
    model: mat4x4<f32>,
    model_view: mat4x4<f32>,
    mvp: mat4x4<f32>,
    light_mvp: array<mat4x4<f32>, 3>,
    normal: mat4x4<f32>,
    ka: vec4<f32>,
    kd: vec4<f32>,
    ks: vec4<f32>,
    shininess: f32,
    alpha: f32,
    cascade: u32,
    padding: u32,
}

struct VertexOutput {
    @builtin(position) clip_position: vec4<f32>,
    @location(0) direction: vec3<f32>,
}

@group(0) @binding(5) var skybox_texture: texture_cube<f32>;
@group(0) @binding(6) var skybox_sampler: sampler;
@group(1) @binding(0) var<uniform> draw: DrawUniforms;

@vertex
fn vs_main(@location(0) position: vec3<f32>) -> VertexOutput {
    var output: VertexOutput;
    let clip = draw.mvp * vec4<f32>(position, 1.0);
    // z = w puts every sky fragment on the far plane.
    output.clip_position = clip.xyww;
    output.direction = position;
    return output;
}

@fragment
fn fs_main(input: VertexOutput) -> @location(0) vec4<f32> {
    // Cube maps are Y-up; the world is Z-up.
    let d = input.direction;
    return textureSample(skybox_texture, skybox_sampler, vec3<f32>(d.x, d.z, -d.y));
}
"#;
