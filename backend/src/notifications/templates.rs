//! Email bodies, rendered with plain `format!`
//!
//! Every interpolated field goes through [`escape_html`] in the HTML part.

use crate::models::format_cents;

/// Subject plus both bodies of one email
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedEmail {
    pub subject: String,
    pub html: String,
    pub text: String,
}

/// Sender block printed under the gift message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SenderSignature {
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub brokerage: Option<String>,
}

pub fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
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

fn layout(title: &str, content: &str) -> String {
    format!(
        r##"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>{title}</title>
</head>
<body style="margin: 0; padding: 0; font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, Arial, sans-serif; background-color: #f5f5f4; color: #1c1917;">
    <table role="presentation" style="width: 100%; border-collapse: collapse;">
        <tr>
            <td style="padding: 32px 16px;">
                <table role="presentation" style="max-width: 560px; margin: 0 auto; background: #ffffff; border-radius: 12px; border: 1px solid #e7e5e4;">
                    <tr>
                        <td style="padding: 32px;">
{content}
                        </td>
                    </tr>
                </table>
            </td>
        </tr>
    </table>
</body>
</html>"##,
        title = escape_html(title),
        content = content,
    )
}

fn signature_html(sender: &SenderSignature) -> String {
    let mut lines = vec![
        format!("<strong>{}</strong>", escape_html(&sender.name)),
        escape_html(&sender.email),
    ];
    if let Some(phone) = &sender.phone {
        lines.push(escape_html(phone));
    }
    if let Some(brokerage) = &sender.brokerage {
        lines.push(escape_html(brokerage));
    }
    format!(
        r#"<p style="margin: 24px 0 0; font-size: 14px; line-height: 1.6; color: #57534e;">{}</p>"#,
        lines.join("<br>")
    )
}

fn signature_text(sender: &SenderSignature) -> String {
    let mut lines = vec![sender.name.clone(), sender.email.clone()];
    lines.extend(sender.phone.iter().cloned());
    lines.extend(sender.brokerage.iter().cloned());
    lines.join("\n")
}

/// Recipient-facing notice carrying the claim link.
pub fn gift_received(
    recipient_name: &str,
    brand_name: &str,
    amount_cents: i64,
    claim_url: &str,
    message: Option<&str>,
    sender: &SenderSignature,
) -> RenderedEmail {
    let amount = format_cents(amount_cents);
    let subject = format!("{} sent you a {} {} gift card", sender.name, amount, brand_name);

    let message_html = message
        .filter(|m| !m.trim().is_empty())
        .map(|m| {
            format!(
                r#"<p style="margin: 0 0 24px; padding: 16px; background: #fafaf9; border-left: 3px solid #0f766e; font-size: 15px; line-height: 1.6;">{}</p>"#,
                escape_html(m)
            )
        })
        .unwrap_or_default();

    let content = format!(
        r#"<h1 style="margin: 0 0 16px; font-size: 24px;">You received a gift!</h1>
<p style="margin: 0 0 16px; font-size: 16px; line-height: 1.6;">Hi {recipient},</p>
<p style="margin: 0 0 24px; font-size: 16px; line-height: 1.6;">Thanks for stopping by. Here is a <strong>{amount} {brand}</strong> gift card as a thank-you.</p>
{message_html}<p style="margin: 0 0 24px; text-align: center;">
    <a href="{claim_url}" style="display: inline-block; background: #0f766e; color: #ffffff; text-decoration: none; font-size: 16px; font-weight: 600; padding: 14px 28px; border-radius: 8px;">Claim your gift card</a>
</p>
<p style="margin: 0; font-size: 13px; color: #78716c;">If the button does not work, paste this link into your browser: {claim_url}</p>
{signature}"#,
        recipient = escape_html(recipient_name),
        amount = escape_html(&amount),
        brand = escape_html(brand_name),
        message_html = message_html,
        claim_url = escape_html(claim_url),
        signature = signature_html(sender),
    );

    let mut text = format!(
        "Hi {},\n\nThanks for stopping by. Here is a {} {} gift card as a thank-you.\n\n",
        recipient_name, amount, brand_name
    );
    if let Some(m) = message.filter(|m| !m.trim().is_empty()) {
        text.push_str(m);
        text.push_str("\n\n");
    }
    text.push_str(&format!(
        "Claim your gift card: {}\n\n{}\n",
        claim_url,
        signature_text(sender)
    ));

    RenderedEmail {
        html: layout(&subject, &content),
        subject,
        text,
    }
}

/// Agent-facing notice about a new visitor lead.
pub fn new_lead(
    agent_name: &str,
    lead_name: &str,
    lead_email: Option<&str>,
    lead_phone: Option<&str>,
    property_address: &str,
    gift_queued: bool,
    dashboard_url: &str,
) -> RenderedEmail {
    let subject = format!("New lead at {}: {}", property_address, lead_name);

    let mut contact_html = String::new();
    let mut contact_text = String::new();
    if let Some(email) = lead_email {
        contact_html.push_str(&format!("Email: {}<br>", escape_html(email)));
        contact_text.push_str(&format!("Email: {}\n", email));
    }
    if let Some(phone) = lead_phone {
        contact_html.push_str(&format!("Phone: {}<br>", escape_html(phone)));
        contact_text.push_str(&format!("Phone: {}\n", phone));
    }

    let gift_note = if gift_queued {
        "A thank-you gift has been queued for this visitor."
    } else {
        ""
    };

    let content = format!(
        r#"<h1 style="margin: 0 0 16px; font-size: 22px;">New open house lead</h1>
<p style="margin: 0 0 16px; font-size: 16px; line-height: 1.6;">Hi {agent},</p>
<p style="margin: 0 0 16px; font-size: 16px; line-height: 1.6;"><strong>{lead}</strong> signed in at <strong>{address}</strong>.</p>
<p style="margin: 0 0 16px; font-size: 15px; line-height: 1.6; color: #44403c;">{contact}</p>
<p style="margin: 0 0 24px; font-size: 15px; color: #0f766e;">{gift_note}</p>
<p style="margin: 0;"><a href="{dashboard}" style="color: #0f766e; font-weight: 600;">Open your dashboard</a></p>"#,
        agent = escape_html(agent_name),
        lead = escape_html(lead_name),
        address = escape_html(property_address),
        contact = contact_html,
        gift_note = gift_note,
        dashboard = escape_html(dashboard_url),
    );

    let text = format!(
        "Hi {},\n\n{} signed in at {}.\n{}\n{}\nDashboard: {}\n",
        agent_name, lead_name, property_address, contact_text, gift_note, dashboard_url
    );

    RenderedEmail {
        html: layout(&subject, &content),
        subject,
        text,
    }
}

/// Agent-facing notice that the prepaid balance is running out.
pub fn low_balance(
    agent_name: &str,
    balance_cents: i64,
    threshold_cents: i64,
    billing_url: &str,
) -> RenderedEmail {
    let balance = format_cents(balance_cents);
    let threshold = format_cents(threshold_cents);
    let subject = format!("Your gift balance is low ({})", balance);

    let content = format!(
        r#"<h1 style="margin: 0 0 16px; font-size: 22px;">Your gift balance is running low</h1>
<p style="margin: 0 0 16px; font-size: 16px; line-height: 1.6;">Hi {agent},</p>
<p style="margin: 0 0 16px; font-size: 16px; line-height: 1.6;">Your available balance is <strong>{balance}</strong>, below {threshold}. Gifts for new leads will fail once the balance cannot cover them.</p>
<p style="margin: 0;"><a href="{billing}" style="color: #0f766e; font-weight: 600;">Add funds</a></p>"#,
        agent = escape_html(agent_name),
        balance = balance,
        threshold = threshold,
        billing = escape_html(billing_url),
    );

    let text = format!(
        "Hi {},\n\nYour available balance is {}, below {}. Gifts for new leads will fail once the balance cannot cover them.\n\nAdd funds: {}\n",
        agent_name, balance, threshold, billing_url
    );

    RenderedEmail {
        html: layout(&subject, &content),
        subject,
        text,
    }
}
