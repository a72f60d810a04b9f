// SPDX-License-Identifier: Apache-2.0 OR MIT
use glint_document::{outline, to_json_string, CompileOptions, Root, Template};

const SOURCE: &str = r#"<nav class="menu ${state.theme}">
  ${state.open ? html`
    <ul>${links.map((link, i) => html`
      <li data-i="${i}" ${link.active ? "current" : "plain"}>
        <a href="${link.url}" onclick=${() => state.clicks++}>${link.label}</a>
      </li>`)}
    </ul>` : html`<p>${core.title} is closed</p>`}
</nav>"#;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let options = CompileOptions::new().with_alias("links", Root::Context);
    let template = Template::compile_with_options("menu", SOURCE, options)?;

    print!("{}", outline(template.nodes()));
    for (raw, reason) in template.unresolved() {
        println!("unresolved {raw}: {reason}");
    }
    println!("{}", to_json_string(template.nodes())?);
    Ok(())
}
