//! SVG renderer: turns a flame graph layout into a standalone, interactive
//! SVG document.

use thiserror::Error;
use timetrace_protocol::{Fill, RenderCommand, Rgb, TextAnchor};

use crate::palette;
use crate::views::flame_graph::{FlameGraph, FlameGraphOptions, XPAD, layout_flame_graph};

const SCRIPT_TEMPLATE: &str = include_str!("../assets/flamegraph.js");

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("unrecognized background color {0:?}, expected #rrggbb")]
    InvalidBackground(String),
    #[error("notes can't contain '<' or '>'")]
    InvalidNotes,
    #[error("invalid {field}: {value}")]
    InvalidDimension { field: &'static str, value: f64 },
}

/// Check options before rendering.
pub fn validate_options(options: &FlameGraphOptions) -> Result<(), RenderError> {
    if let Some(notes) = &options.notes
        && notes.contains(['<', '>'])
    {
        return Err(RenderError::InvalidNotes);
    }
    let dimensions = [
        ("image_width", options.image_width),
        ("frame_height", options.frame_height),
        ("font_size", options.font_size),
        ("font_width", options.font_width),
        ("factor", options.factor),
    ];
    for (field, value) in dimensions {
        if !value.is_finite() || value <= 0.0 {
            return Err(RenderError::InvalidDimension { field, value });
        }
    }
    if options.image_width <= 2.0 * XPAD {
        return Err(RenderError::InvalidDimension {
            field: "image_width",
            value: options.image_width,
        });
    }
    if palette::background_stops(&options.background, options.palette).is_none() {
        let shown = match &options.background {
            timetrace_protocol::Background::Flat(color) => color.clone(),
            other => format!("{other:?}"),
        };
        return Err(RenderError::InvalidBackground(shown));
    }
    Ok(())
}

/// Render a flame graph. A graph without any time renders the fixed
/// "no valid input" image.
pub fn render_flame_graph(
    graph: &FlameGraph,
    options: &FlameGraphOptions,
) -> Result<String, RenderError> {
    validate_options(options)?;
    if graph.is_empty() {
        return Ok(render_no_data(options));
    }

    let layout = layout_flame_graph(graph, options);
    let mut svg = String::with_capacity(layout.commands.len() * 120 + SCRIPT_TEMPLATE.len() + 2048);
    push_header(&mut svg, layout.width, layout.height, options);
    push_defs(&mut svg, options);
    if options.interactive {
        push_script(&mut svg, options);
    }
    render_commands(&mut svg, &layout.commands);
    svg.push_str("</svg>\n");
    Ok(svg)
}

/// The image shown when there is nothing to draw.
pub fn render_no_data(options: &FlameGraphOptions) -> String {
    let width = options.image_width;
    let height = options.font_size * 5.0;
    let mut svg = String::new();
    push_header(&mut svg, width, height, options);
    svg.push_str(&format!(
        "<text x=\"{:.2}\" y=\"{}\">ERROR: No valid input provided.</text>\n",
        width / 2.0,
        options.font_size * 2.0,
    ));
    svg.push_str("</svg>\n");
    svg
}

fn push_header(svg: &mut String, width: f64, height: f64, options: &FlameGraphOptions) {
    svg.push_str("<?xml version=\"1.0\" standalone=\"no\"?>\n");
    svg.push_str("<!DOCTYPE svg PUBLIC \"-//W3C//DTD SVG 1.1//EN\" \"http://www.w3.org/Graphics/SVG/1.1/DTD/svg11.dtd\">\n");
    svg.push_str(&format!(
        r#"<svg version="1.1" width="{width}" height="{height}" onload="init(evt)" viewBox="0 0 {width} {height}" xmlns="http://www.w3.org/2000/svg" xmlns:xlink="http://www.w3.org/1999/xlink">"#,
    ));
    svg.push('\n');
    svg.push_str(&format!(
        "<!-- NOTES: {} -->\n",
        options.notes.as_deref().unwrap_or_default()
    ));
}

fn push_defs(svg: &mut String, options: &FlameGraphOptions) {
    let (stop1, stop2) = palette::background_stops(&options.background, options.palette)
        .unwrap_or_else(|| ("#f8f8f8".to_string(), "#e8e8e8".to_string()));
    let fs = options.font_size;
    svg.push_str(&format!(
        r#"<defs>
	<linearGradient id="background" y1="0" y2="1" x1="0" x2="0" >
		<stop stop-color="{stop1}" offset="5%" />
		<stop stop-color="{stop2}" offset="95%" />
	</linearGradient>
</defs>
<style type="text/css">
	text {{ font-family:{font}; font-size:{fs}px; fill:{black}; }}
	#search, #ignorecase {{ opacity:0.1; cursor:pointer; }}
	#search:hover, #search.show, #ignorecase:hover, #ignorecase.show {{ opacity:1; }}
	#subtitle {{ text-anchor:middle; font-color:{grey}; }}
	#title {{ text-anchor:middle; font-size:{title}px}}
	#unzoom {{ cursor:pointer; }}
	#frames > *:hover {{ stroke:black; stroke-width:0.5; cursor:pointer; }}
	.hide {{ display:none; }}
	.parent {{ opacity:0.5; }}
</style>
"#,
        font = escape_xml(&options.font_type),
        black = Rgb::BLACK,
        grey = palette::SEPARATOR_COLOR,
        title = fs + 5.0,
    ));
}

fn push_script(svg: &mut String, options: &FlameGraphOptions) {
    let script = SCRIPT_TEMPLATE
        .replace("{{xpad}}", &XPAD.to_string())
        .replace("{{fontsize}}", &options.font_size.to_string())
        .replace("{{fontwidth}}", &options.font_width.to_string())
        .replace("{{nametype}}", &escape_js(&options.name_type))
        .replace("{{searchcolor}}", &escape_js(&options.search_color));
    svg.push_str("<script type=\"text/ecmascript\">\n<![CDATA[\n");
    svg.push_str(&script.replace("]]>", "]]]]><![CDATA[>"));
    svg.push_str("]]>\n</script>\n");
}

/// Write render commands as SVG elements.
pub fn render_commands(svg: &mut String, commands: &[RenderCommand]) {
    for cmd in commands {
        match cmd {
            RenderCommand::DrawRect {
                rect,
                fill,
                corner_radius,
            } => {
                let fill = match fill {
                    Fill::Color(rgb) => rgb.to_string(),
                    Fill::Reference(id) => format!("url(#{id})"),
                };
                let rounding = if *corner_radius > 0.0 {
                    format!(r#" rx="{corner_radius}" ry="{corner_radius}""#)
                } else {
                    String::new()
                };
                svg.push_str(&format!(
                    r#"<rect x="{:.1}" y="{}" width="{:.1}" height="{}" fill="{fill}"{rounding} />"#,
                    rect.x, rect.y, rect.w, rect.h,
                ));
                svg.push('\n');
            }
            RenderCommand::DrawText {
                position,
                text,
                anchor,
                id,
                class,
            } => {
                svg.push_str("<text");
                if let Some(id) = id {
                    svg.push_str(&format!(r#" id="{}""#, escape_xml(id)));
                }
                svg.push_str(&format!(r#" x="{:.2}" y="{}""#, position.x, position.y));
                if *anchor == TextAnchor::Middle {
                    svg.push_str(r#" text-anchor="middle""#);
                }
                if let Some(class) = class {
                    svg.push_str(&format!(r#" class="{}""#, escape_xml(class)));
                }
                svg.push_str(&format!(">{}</text>\n", escape_xml(text)));
            }
            RenderCommand::BeginGroup { id, title } => {
                match id {
                    Some(id) => svg.push_str(&format!("<g id=\"{}\">\n", escape_xml(id))),
                    None => svg.push_str("<g>\n"),
                }
                if let Some(title) = title {
                    svg.push_str(&format!("<title>{}</title>", escape_xml(title)));
                }
            }
            RenderCommand::EndGroup => svg.push_str("</g>\n"),
        }
    }
}

fn escape_xml(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

fn escape_js(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}
