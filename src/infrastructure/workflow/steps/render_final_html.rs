use std::fmt::Write;

use async_trait::async_trait;
use chrono::Utc;

use super::RENDER_FINAL_HTML;
use crate::domain::workflow::{StepError, StepScope, WorkflowContext, WorkflowStep};

const STYLE: &str = r#"
        :root { --primary: #2563eb; --border: #e2e8f0; --muted: #64748b; }
        * { box-sizing: border-box; margin: 0; padding: 0; }
        body { font-family: -apple-system, 'Segoe UI', Roboto, Arial, sans-serif; line-height: 1.6; color: #1e293b; background: #f8fafc; padding: 2rem; }
        .container { max-width: 800px; margin: 0 auto; }
        .header { background: linear-gradient(135deg, var(--primary), #3b82f6); color: white; padding: 2rem; border-radius: 12px 12px 0 0; }
        .header h1 { font-size: 1.75rem; margin-bottom: 0.5rem; }
        .meta { opacity: 0.9; font-size: 0.875rem; }
        .content { background: white; padding: 2rem; border: 1px solid var(--border); border-top: none; }
        .section-title { font-size: 1.125rem; font-weight: 600; color: var(--primary); margin-bottom: 0.75rem; }
        .section-content { white-space: pre-wrap; }
        .badge { display: inline-block; padding: 0.25rem 0.75rem; border-radius: 9999px; font-size: 0.75rem; font-weight: 500; text-transform: uppercase; }
        .badge-primary { background: #dbeafe; color: #1e40af; }
        .badge-secondary { background: #f1f5f9; color: #475569; }
        .warnings { background: #fef3c7; border: 1px solid #f59e0b; border-radius: 8px; padding: 1rem; margin-top: 1rem; }
        .warnings-title { color: #92400e; font-weight: 600; margin-bottom: 0.5rem; }
        .warnings ul { margin-left: 1.25rem; color: #92400e; }
        .footer { background: white; padding: 1rem 2rem; border: 1px solid var(--border); border-top: none; border-radius: 0 0 12px 12px; font-size: 0.75rem; color: var(--muted); text-align: center; }
        @media print { body { background: white; padding: 0; } .container { max-width: none; } }
"#;

/// Escape text for inclusion in HTML element content or attribute values
pub(crate) fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Wraps the final text in a standalone HTML document
#[derive(Debug, Default)]
pub struct RenderFinalHtmlStep;

impl RenderFinalHtmlStep {
    fn render(ctx: &WorkflowContext, body: &str) -> Result<String, std::fmt::Error> {
        let options = ctx.options;
        let mut html = String::new();

        writeln!(html, "<!DOCTYPE html>")?;
        writeln!(html, "<html lang=\"en\">")?;
        writeln!(html, "<head>")?;
        writeln!(html, "    <meta charset=\"UTF-8\">")?;
        writeln!(html, "    <meta name=\"viewport\" content=\"width=device-width, initial-scale=1.0\">")?;
        writeln!(html, "    <title>PolicyPack - Generated Document</title>")?;
        writeln!(html, "    <style>{}    </style>", STYLE)?;
        writeln!(html, "</head>")?;
        writeln!(html, "<body>")?;
        writeln!(html, "    <div class=\"container\">")?;

        writeln!(html, "        <div class=\"header\">")?;
        writeln!(html, "            <h1>PolicyPack Document</h1>")?;
        writeln!(
            html,
            "            <div class=\"meta\">Generated on {} UTC</div>",
            Utc::now().format("%B %d, %Y at %H:%M")
        )?;
        writeln!(html, "            <div class=\"meta\">")?;
        writeln!(
            html,
            "                <span class=\"badge badge-primary\">{}</span>",
            options.audience.label()
        )?;
        writeln!(
            html,
            "                <span class=\"badge badge-secondary\">{} Tone</span>",
            options.tone.label()
        )?;
        if options.strict_compliance {
            writeln!(
                html,
                "                <span class=\"badge badge-secondary\">Strict Compliance</span>"
            )?;
        }
        writeln!(html, "            </div>")?;
        writeln!(html, "        </div>")?;

        writeln!(html, "        <div class=\"content\">")?;
        writeln!(html, "            <div class=\"section\">")?;
        writeln!(html, "                <h2 class=\"section-title\">Final Document</h2>")?;
        writeln!(
            html,
            "                <div class=\"section-content\">{}</div>",
            escape_html(body)
        )?;
        writeln!(html, "            </div>")?;

        if !ctx.warnings.is_empty() {
            writeln!(html, "            <div class=\"warnings\">")?;
            writeln!(html, "                <div class=\"warnings-title\">Processing Warnings</div>")?;
            writeln!(html, "                <ul>")?;
            for warning in &ctx.warnings {
                writeln!(html, "                    <li>{}</li>", escape_html(warning))?;
            }
            writeln!(html, "                </ul>")?;
            writeln!(html, "            </div>")?;
        }

        writeln!(html, "        </div>")?;
        writeln!(html, "        <div class=\"footer\">Generated by PolicyPack Builder</div>")?;
        writeln!(html, "    </div>")?;
        writeln!(html, "</body>")?;
        writeln!(html, "</html>")?;

        Ok(html)
    }
}

#[async_trait]
impl WorkflowStep for RenderFinalHtmlStep {
    fn name(&self) -> &'static str {
        RENDER_FINAL_HTML
    }

    fn order(&self) -> u32 {
        6
    }

    fn description(&self) -> &'static str {
        "Render the final document as HTML"
    }

    fn uses_llm(&self) -> bool {
        false
    }

    async fn execute(&self, ctx: &mut WorkflowContext, scope: &StepScope) -> Result<(), StepError> {
        scope.ensure_not_cancelled()?;

        let body = ctx
            .tone_rewritten_text
            .clone()
            .or_else(|| ctx.compliant_text.clone())
            .unwrap_or_default();

        let html = Self::render(ctx, &body)
            .map_err(|e| StepError::collaborator(format!("Failed to render HTML: {}", e)))?;

        ctx.final_html = Some(html);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::workflow::{test_scope, Audience, Tone, WorkflowOptions};

    #[test]
    fn test_escape_html() {
        assert_eq!(
            escape_html(r#"<b>"Tom" & 'Jerry'</b>"#),
            "&lt;b&gt;&quot;Tom&quot; &amp; &#39;Jerry&#39;&lt;/b&gt;"
        );
    }

    #[tokio::test]
    async fn test_renders_escaped_body_badges_and_warnings() {
        let (scope, _handle, _hub) = test_scope(RENDER_FINAL_HTML);
        let options = WorkflowOptions::new(Audience::Legal, Tone::Formal, true);
        let mut ctx = WorkflowContext::new("x", options);
        ctx.tone_rewritten_text = Some("Contact <script>alert(1)</script> [EMAIL_1]".to_string());
        ctx.add_warning("Compliance: 'promise' & more (Severity: med)");

        RenderFinalHtmlStep.execute(&mut ctx, &scope).await.unwrap();

        let html = ctx.final_html.unwrap();
        assert!(html.starts_with("<!DOCTYPE html>"));
        assert!(html.contains("&lt;script&gt;alert(1)&lt;/script&gt; [EMAIL_1]"));
        assert!(!html.contains("<script>"));
        assert!(html.contains("badge-primary\">Legal</span>"));
        assert!(html.contains("Formal Tone"));
        assert!(html.contains("Strict Compliance"));
        assert!(html.contains("<li>Compliance: &#39;promise&#39; &amp; more (Severity: med)</li>"));
    }

    #[tokio::test]
    async fn test_no_warning_block_without_warnings() {
        let (scope, _handle, _hub) = test_scope(RENDER_FINAL_HTML);
        let mut ctx = WorkflowContext::new("x", WorkflowOptions::default());
        ctx.compliant_text = Some("Plain".to_string());

        RenderFinalHtmlStep.execute(&mut ctx, &scope).await.unwrap();

        let html = ctx.final_html.unwrap();
        assert!(html.contains(">Plain</div>"));
        assert!(!html.contains("Processing Warnings"));
        assert!(!html.contains("Strict Compliance"));
    }
}
