/// Skinning and morphing vertex shader. Attribute locations match the
/// `ATTR_LOC_*` constants.
pub const STANDARD_VERTEX_SHADER: &str = r#"#version 300 es
precision highp float;
precision highp int;

layout(location = 0) in vec3 POSITION;
#ifdef HAS_NORMAL
layout(location = 1) in vec3 NORMAL;
#endif
#ifdef HAS_TANGENT
layout(location = 2) in vec4 TANGENT;
#endif
#ifdef HAS_TEXCOORD_0
layout(location = 3) in vec2 TEXCOORD_0;
#endif
#ifdef HAS_TEXCOORD_1
layout(location = 4) in vec2 TEXCOORD_1;
#endif
#if defined(HAS_JOINTS_0) && defined(HAS_WEIGHTS_0)
#define USE_SKINNING
layout(location = 5) in uvec4 JOINTS_0;
layout(location = 6) in vec4 WEIGHTS_0;
uniform mat4 jointMatrices[MAX_JOINTS];
uniform int jointCount;
#endif

#ifdef MORPH_TARGET_COUNT
uniform float morphWeights[MORPH_TARGET_COUNT];
#ifdef HAS_MORPH_POSITION
layout(location = 7) in vec3 MORPH_POSITION_0;
#if MORPH_TARGET_COUNT > 1
layout(location = 8) in vec3 MORPH_POSITION_1;
#endif
#if MORPH_TARGET_COUNT > 2
layout(location = 9) in vec3 MORPH_POSITION_2;
#endif
#endif
#ifdef HAS_MORPH_NORMAL
layout(location = 10) in vec3 MORPH_NORMAL_0;
#if MORPH_TARGET_COUNT > 1
layout(location = 11) in vec3 MORPH_NORMAL_1;
#endif
#if MORPH_TARGET_COUNT > 2
layout(location = 12) in vec3 MORPH_NORMAL_2;
#endif
#endif
#ifdef HAS_MORPH_TANGENT
layout(location = 13) in vec3 MORPH_TANGENT_0;
#if MORPH_TARGET_COUNT > 1
layout(location = 14) in vec3 MORPH_TANGENT_1;
#endif
#if MORPH_TARGET_COUNT > 2
layout(location = 15) in vec3 MORPH_TANGENT_2;
#endif
#endif
#endif

uniform mat4 projViewMatrix;
uniform mat4 modelMatrix;
uniform mat3 normalMatrix;

out vec3 v_position;
out vec2 v_texcoord0;
out vec2 v_texcoord1;
#ifdef HAS_NORMAL
out vec3 v_normal;
#endif
#ifdef HAS_TANGENT
out vec4 v_tangent;
#endif

void main() {
    vec3 position = POSITION;
#ifdef HAS_NORMAL
    vec3 normal = NORMAL;
#endif
#ifdef HAS_TANGENT
    vec3 tangent = TANGENT.xyz;
#endif

#ifdef MORPH_TARGET_COUNT
#ifdef HAS_MORPH_POSITION
    position += morphWeights[0] * MORPH_POSITION_0;
#if MORPH_TARGET_COUNT > 1
    position += morphWeights[1] * MORPH_POSITION_1;
#endif
#if MORPH_TARGET_COUNT > 2
    position += morphWeights[2] * MORPH_POSITION_2;
#endif
#endif
#if defined(HAS_MORPH_NORMAL) && defined(HAS_NORMAL)
    normal += morphWeights[0] * MORPH_NORMAL_0;
#if MORPH_TARGET_COUNT > 1
    normal += morphWeights[1] * MORPH_NORMAL_1;
#endif
#if MORPH_TARGET_COUNT > 2
    normal += morphWeights[2] * MORPH_NORMAL_2;
#endif
#endif
#if defined(HAS_MORPH_TANGENT) && defined(HAS_TANGENT)
    tangent += morphWeights[0] * MORPH_TANGENT_0;
#if MORPH_TARGET_COUNT > 1
    tangent += morphWeights[1] * MORPH_TANGENT_1;
#endif
#if MORPH_TARGET_COUNT > 2
    tangent += morphWeights[2] * MORPH_TANGENT_2;
#endif
#endif
#endif

    mat4 skin = mat4(1.0);
#ifdef USE_SKINNING
    if (jointCount > 0) {
        skin = WEIGHTS_0.x * jointMatrices[JOINTS_0.x]
             + WEIGHTS_0.y * jointMatrices[JOINTS_0.y]
             + WEIGHTS_0.z * jointMatrices[JOINTS_0.z]
             + WEIGHTS_0.w * jointMatrices[JOINTS_0.w];
    }
#endif

    vec4 world = modelMatrix * skin * vec4(position, 1.0);
    v_position = world.xyz / world.w;
#ifdef HAS_NORMAL
    v_normal = normalize(normalMatrix * mat3(skin) * normal);
#endif
#ifdef HAS_TANGENT
    v_tangent = vec4(normalize(mat3(modelMatrix) * mat3(skin) * tangent), TANGENT.w);
#endif
#ifdef HAS_TEXCOORD_0
    v_texcoord0 = TEXCOORD_0;
#else
    v_texcoord0 = vec2(0.0);
#endif
#ifdef HAS_TEXCOORD_1
    v_texcoord1 = TEXCOORD_1;
#else
    v_texcoord1 = v_texcoord0;
#endif
    gl_Position = projViewMatrix * world;
}
"#;

/// Metallic-roughness fragment shader with one directional light.
pub const STANDARD_FRAGMENT_SHADER: &str = r#"#version 300 es
precision highp float;

in vec3 v_position;
in vec2 v_texcoord0;
in vec2 v_texcoord1;
#ifdef HAS_NORMAL
in vec3 v_normal;
#endif
#ifdef HAS_TANGENT
in vec4 v_tangent;
#endif

uniform vec4 baseColorFactor;
uniform vec2 metallicRoughnessValues;
uniform vec3 emissiveFactor;
uniform float normalScale;
uniform float occlusionStrength;
uniform vec3 lightDirection;
uniform vec3 lightColor;
uniform vec3 cameraPosition;

#ifdef HAS_BASE_COLOR_TEXTURE
uniform sampler2D baseColorSampler;
uniform int baseColorUvSet;
#endif
#ifdef HAS_METALLIC_ROUGHNESS_TEXTURE
uniform sampler2D metallicRoughnessSampler;
uniform int metallicRoughnessUvSet;
#endif
#ifdef HAS_NORMAL_TEXTURE
uniform sampler2D normalSampler;
uniform int normalUvSet;
#endif
#ifdef HAS_OCCLUSION_TEXTURE
uniform sampler2D occlusionSampler;
uniform int occlusionUvSet;
#endif
#ifdef HAS_EMISSIVE_TEXTURE
uniform sampler2D emissiveSampler;
uniform int emissiveUvSet;
#endif

out vec4 FRAG_COLOR;

const float PI = 3.141592653589793;

vec2 uvSet(int set) {
    return set == 1 ? v_texcoord1 : v_texcoord0;
}

vec3 surfaceNormal() {
#ifdef HAS_NORMAL
    vec3 n = normalize(v_normal);
#else
    vec3 n = normalize(cross(dFdx(v_position), dFdy(v_position)));
#endif
#ifdef HAS_NORMAL_TEXTURE
    vec2 uv = uvSet(normalUvSet);
    vec3 sampled = texture(normalSampler, uv).rgb * 2.0 - 1.0;
    sampled.xy *= normalScale;
#ifdef HAS_TANGENT
    vec3 t = normalize(v_tangent.xyz - n * dot(n, v_tangent.xyz));
    vec3 b = cross(n, t) * v_tangent.w;
#else
    vec3 dp1 = dFdx(v_position);
    vec3 dp2 = dFdy(v_position);
    vec2 duv1 = dFdx(uv);
    vec2 duv2 = dFdy(uv);
    vec3 t = normalize(dp1 * duv2.y - dp2 * duv1.y);
    vec3 b = normalize(cross(n, t));
#endif
    n = normalize(mat3(t, b, n) * sampled);
#endif
    return gl_FrontFacing ? n : -n;
}

void main() {
    vec4 baseColor = baseColorFactor;
#ifdef HAS_BASE_COLOR_TEXTURE
    vec4 texel = texture(baseColorSampler, uvSet(baseColorUvSet));
    baseColor *= vec4(pow(texel.rgb, vec3(2.2)), texel.a);
#endif
    float metallic = metallicRoughnessValues.x;
    float roughness = metallicRoughnessValues.y;
#ifdef HAS_METALLIC_ROUGHNESS_TEXTURE
    vec4 mr = texture(metallicRoughnessSampler, uvSet(metallicRoughnessUvSet));
    roughness *= mr.g;
    metallic *= mr.b;
#endif
    roughness = clamp(roughness, 0.04, 1.0);
    metallic = clamp(metallic, 0.0, 1.0);

    vec3 n = surfaceNormal();
    vec3 v = normalize(cameraPosition - v_position);
    vec3 l = normalize(-lightDirection);
    vec3 h = normalize(l + v);
    float NdotL = clamp(dot(n, l), 0.001, 1.0);
    float NdotV = clamp(abs(dot(n, v)), 0.001, 1.0);
    float NdotH = clamp(dot(n, h), 0.0, 1.0);
    float VdotH = clamp(dot(v, h), 0.0, 1.0);

    vec3 f0 = mix(vec3(0.04), baseColor.rgb, metallic);
    vec3 diffuseColor = baseColor.rgb * (1.0 - metallic) * 0.96;
    float alpha = roughness * roughness;
    vec3 F = f0 + (1.0 - f0) * pow(1.0 - VdotH, 5.0);
    float k = alpha / 2.0;
    float G = (NdotL / (NdotL * (1.0 - k) + k)) * (NdotV / (NdotV * (1.0 - k) + k));
    float a2 = alpha * alpha;
    float d = NdotH * NdotH * (a2 - 1.0) + 1.0;
    float D = a2 / (PI * d * d);
    vec3 diffuse = (1.0 - F) * diffuseColor / PI;
    vec3 specular = F * G * D / (4.0 * NdotL * NdotV);
    vec3 color = NdotL * lightColor * (diffuse + specular) + 0.03 * baseColor.rgb;

#ifdef HAS_OCCLUSION_TEXTURE
    float ao = texture(occlusionSampler, uvSet(occlusionUvSet)).r;
    color = mix(color, color * ao, occlusionStrength);
#endif
    vec3 emissive = emissiveFactor;
#ifdef HAS_EMISSIVE_TEXTURE
    emissive *= pow(texture(emissiveSampler, uvSet(emissiveUvSet)).rgb, vec3(2.2));
#endif
    color += emissive;

    // The framebuffer is not SRGB, so we transform the linear color to close-enough-to-srgb.
    FRAG_COLOR = vec4(pow(color, vec3(1.0 / 2.2)), baseColor.a);
}
"#;
