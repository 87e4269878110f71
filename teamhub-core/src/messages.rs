//! Chat message builders for every notification the hub sends.

use chrono_tz::Tz;

use crate::allocation::EquipmentAllocation;
use crate::chat::{Block, Button, ChatMessage, Text};
use crate::custody::{CustodySummary, UnreportedScan};
use crate::equipment::Equipment;
use crate::error::{HubError, HubResult};
use crate::event::Event;
use crate::final_call::FinalCallReport;
use crate::member::Member;
use crate::participation::ParticipationType;
use crate::rsvp::{RsvpCounts, RsvpSummary};

const CHARGE_MARKER: &str = ":electric_plug::zap:";

/// Links and zone used when rendering messages.
#[derive(Debug, Clone)]
pub struct MessageContext {
    pub app_base_url: String,
    pub help_page_url: String,
    pub timezone: Tz,
}

impl MessageContext {
    fn date(&self, event: &Event) -> String {
        event
            .start_time
            .with_timezone(&self.timezone)
            .format("%Y/%m/%d")
            .to_string()
    }

    fn report_url(&self) -> String {
        format!("{}/equips/report", self.app_base_url)
    }

    fn conditioning_form_url(&self, label: &str, position: &str) -> HubResult<String> {
        reqwest::Url::parse_with_params(
            &format!("{}/redirect/conditioning-form", self.app_base_url),
            &[("label", label), ("position", position)],
        )
        .map(String::from)
        .map_err(|e| HubError::Config(format!("invalid app_base_url '{}': {e}", self.app_base_url)))
    }
}

fn mention(member_id: &str) -> String {
    format!("<@{member_id}>")
}

fn equipment_line(item: &Equipment) -> String {
    if item.needs_charge() {
        format!("{CHARGE_MARKER} _{}_", item.name)
    } else {
        format!("_{}_", item.name)
    }
}

/// A member changed their answer close to the event.
pub fn last_minute_rsvp_change(
    ctx: &MessageContext,
    member: &Member,
    event: &Event,
    prev: ParticipationType,
    next: ParticipationType,
) -> ChatMessage {
    let kind = event.tag().label();
    let role = if member.role_title.is_empty() {
        "ポジション未設定"
    } else {
        member.role_title.as_str()
    };
    let text = format!(
        "以下の *{kind}* に回答変更がありました。\n*{}* [{}] *{} ⇒ {}*\n{} ({role})",
        ctx.date(event),
        event.title,
        prev.label(),
        next.label(),
        member.display_name,
    );
    ChatMessage::new(text.clone()).with_blocks(vec![Block::section(Text::markdown(text))])
}

/// Ask every attending holder to bring what they have.
pub fn equipment_bring_reminder(alloc: &EquipmentAllocation) -> ChatMessage {
    let headline = format!(
        "【前日確認】備品を持って帰ってくれている皆さまへ `{}` にて以下の備品を持ってきていただけるようお願いします :bow:",
        alloc.event.title
    );
    let mut blocks = vec![Block::section(Text::markdown(headline.clone()))];
    for (holder, items) in &alloc.ok {
        let names: Vec<String> = items.iter().map(equipment_line).collect();
        blocks.push(Block::fields(vec![
            Text::markdown(mention(holder)),
            Text::markdown(names.join("\n")),
        ]));
    }
    if !alloc.ng.is_empty() {
        blocks.push(Block::Divider);
        blocks.push(Block::context(Text::markdown(
            "以下の備品は、持っている方が欠席または未回答です。代わりに持ってこられる方は調整をお願いします。",
        )));
        for (holder, items) in &alloc.ng {
            let names: Vec<String> = items.iter().map(equipment_line).collect();
            blocks.push(Block::fields(vec![
                Text::markdown(mention(holder)),
                Text::markdown(names.join("\n")),
            ]));
        }
    }
    ChatMessage::new(headline).with_blocks(blocks)
}

/// After the event: please report who took what home.
pub fn equipment_report_request(ctx: &MessageContext, event: &Event) -> ChatMessage {
    let text = format!(
        "@channel お疲れさまでした！ *{}*\n備品を持って帰って頂いた方は、以下のフォームにご回答いただくようお願いいたします :bow:\n{}",
        event.title,
        ctx.report_url()
    );
    ChatMessage::new(text.clone()).with_blocks(vec![Block::section(Text::markdown(text))])
}

/// Headline of the periodic RSVP check.
pub fn rsvp_check(ctx: &MessageContext, event: &Event, counts: RsvpCounts) -> ChatMessage {
    let body = format!(
        "参加:\t\t{}\n不参加:\t{}\n未回答:\t{}",
        counts.join, counts.absent, counts.unanswered
    );
    let link = format!(
        "<{0}|:football: :football: :football: {0}>",
        ctx.app_base_url
    );
    ChatMessage::new(format!("{}\n{body}", event.title)).with_blocks(vec![
        Block::header(event.title.clone()),
        Block::section(Text::plain(body)),
        Block::section(Text::markdown(link)),
    ])
}

/// Threaded follow-up to [`rsvp_check`] mentioning who has not answered.
pub fn rsvp_reminder(ctx: &MessageContext, event: &Event, summary: &RsvpSummary) -> ChatMessage {
    let mentions: Vec<String> = summary
        .mentionable_unanswered()
        .map(|m| mention(&m.id))
        .collect();
    let mut blocks = vec![
        Block::header("出欠未回答の皆さまへ"),
        Block::section(Text::markdown(format!(
            "下記のリンクから練習や試合の出欠回答ができます。サクッと回答お願いします。\n*<{}|【Team Hub】>*",
            ctx.app_base_url
        ))),
        Block::section(Text::markdown(format!(
            "使い方やログイン方法が分からない場合は、下記のリンクで詳しい解説があるので、ご参考ください。\n*<{}|【hubの使い方】>*",
            ctx.help_page_url
        ))),
    ];
    if !mentions.is_empty() {
        blocks.push(Block::Divider);
        blocks.push(Block::context(Text::plain(format!(
            "直近の「{}」へ出欠回答していない人",
            event.title
        ))));
        blocks.push(Block::section(Text::markdown(mentions.join(" "))));
    }
    ChatMessage::new("出欠未回答の皆さまへ").with_blocks(blocks)
}

/// Roll-call by role for the next event.
pub fn final_call(
    ctx: &MessageContext,
    event: &Event,
    roles: &[String],
    report: &FinalCallReport,
) -> ChatMessage {
    let headline = format!(
        "<{}/events/{}|{}> の出欠状況 （ポジション設定: {}）",
        ctx.app_base_url,
        event.id,
        event.title,
        roles.join(", ")
    );
    let mut blocks = vec![Block::section(Text::markdown(headline.clone())), Block::Divider];

    for (i, role) in roles.iter().enumerate() {
        if roles.len() > 1 {
            blocks.push(Block::context(Text::markdown(format!(
                "*{}*",
                role.to_uppercase()
            ))));
        }
        match report.by_role.get(role) {
            Some(answers) if !answers.is_empty() => {
                let names: Vec<&str> = answers.iter().map(|p| p.name.as_str()).collect();
                blocks.push(Block::section(Text::markdown(names.join(",  "))));
            }
            _ => blocks.push(Block::context(Text::markdown(format!(
                "Slackプロフィールで「役職（Title）」を「{role}」や「{}」などに設定している人はいません.",
                role.to_uppercase()
            )))),
        }
        if i + 1 < roles.len() {
            blocks.push(Block::Divider);
        }
    }

    let mentions: Vec<String> = report
        .unanswered
        .iter()
        .filter(|m| m.is_mentionable())
        .map(|m| mention(&m.id))
        .collect();
    if !mentions.is_empty() {
        blocks.push(Block::Divider);
        blocks.push(Block::context(Text::plain("未回答")));
        blocks.push(Block::section(Text::markdown(mentions.join(" "))));
    }

    ChatMessage::new(headline).with_blocks(blocks)
}

/// Ask a position group to fill in the conditioning check sheet.
///
/// `label` is passed through to the form; `before` and `after` also get
/// a pre- or post-workout prefix.
pub fn conditioning_check(
    ctx: &MessageContext,
    event: &Event,
    label: &str,
    position: &str,
) -> HubResult<ChatMessage> {
    let mut text = format!(
        "コンディショニングチェックシートのご入力宜しくお願い致します！ *【{}】*\n{}",
        position.to_uppercase(),
        event.title
    );
    match label {
        "before" => text = format!("*【運動前】* {text}"),
        "after" => text = format!("*【運動後】* {text}"),
        _ => {}
    }
    let link = ctx.conditioning_form_url(label, position)?;
    Ok(ChatMessage::new(text.clone()).with_blocks(vec![
        Block::section(Text::markdown(text)),
        Block::button(Button::primary("チェックシートを開く", link)),
    ]))
}

/// Equipment nobody has reported on since `event` ended.
pub fn unreported_scan(ctx: &MessageContext, event: &Event, scan: &UnreportedScan) -> ChatMessage {
    let headline = format!(
        "以下の備品は「{}: {}」から現時点までで備品報告の無いものです。必要なら代理報告機能を使って、備品の所在を登録してください。",
        ctx.date(event),
        event.title
    );
    let lines: Vec<String> = scan
        .never_reported
        .iter()
        .map(|e| format!("・{} [報告ゼロ]", e.name))
        .chain(scan.unreported.iter().map(|t| {
            format!(
                "・<{}/equips/{}|{}>",
                ctx.app_base_url, t.equipment.id, t.equipment.name
            )
        }))
        .collect();

    ChatMessage::new(headline.clone()).with_blocks(vec![
        Block::section(Text::markdown(headline)),
        Block::Divider,
        Block::section(Text::markdown(lines.join("\n"))),
        Block::Divider,
        Block::section(Text::markdown(ctx.report_url())),
    ])
}

/// Inventory health: unmanaged items and stale custody reports.
pub fn custody_summary(ctx: &MessageContext, summary: &CustodySummary) -> ChatMessage {
    let mut blocks = vec![Block::header("備品管理状況")];

    if !summary.unmanaged.is_empty() {
        let lines: Vec<String> = summary
            .unmanaged
            .iter()
            .map(|e| format!("・<{}/equips/{}|{}>", ctx.app_base_url, e.id, e.name))
            .collect();
        blocks.push(Block::section(Text::markdown(format!(
            "*管理者不明*\n{}",
            lines.join("\n")
        ))));
    }

    if !summary.not_updated.is_empty() {
        let since = summary
            .since
            .with_timezone(&ctx.timezone)
            .format("%Y/%m/%d");
        let lines: Vec<String> = summary
            .not_updated
            .iter()
            .map(|t| match t.current_holder() {
                Some(holder) => format!("・{} [直近: {}]", t.equipment.name, mention(&holder.member_id)),
                None => format!("・{}", t.equipment.name),
            })
            .collect();
        blocks.push(Block::section(Text::markdown(format!(
            "*{since} 以降の報告なし*\n{}",
            lines.join("\n")
        ))));
    }

    if blocks.len() == 1 {
        blocks.push(Block::section(Text::plain("すべての備品の所在が確認できています。")));
    }
    blocks.push(Block::section(Text::markdown(ctx.report_url())));

    ChatMessage::new("備品管理状況").with_blocks(blocks)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::allocation::plan;
    use crate::custody::{TrackedEquipment, record_custody};
    use crate::participation::{Participation, Participations, upsert};
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use std::collections::BTreeMap;

    fn ctx() -> MessageContext {
        MessageContext {
            app_base_url: "https://hub.example.com".into(),
            help_page_url: "https://help.example.com".into(),
            timezone: chrono_tz::Asia::Tokyo,
        }
    }

    fn start() -> DateTime<Utc> {
        // 2025/06/07 00:30 in Tokyo
        Utc.with_ymd_and_hms(2025, 6, 6, 15, 30, 0).unwrap()
    }

    #[test]
    fn test_last_minute_change_uses_local_date_and_labels() {
        let event = Event::new("ev", "#試合 vs Eagles", start(), start() + Duration::hours(3));
        let member = Member::new("U1", "Taro");
        let msg = last_minute_rsvp_change(
            &ctx(),
            &member,
            &event,
            ParticipationType::Join,
            ParticipationType::Absent,
        );
        let text = msg.rendered();
        assert!(text.contains("*試合*"));
        assert!(text.contains("*2025/06/07*"));
        assert!(text.contains("*出席 ⇒ 欠席*"));
        assert!(text.contains("Taro (ポジション未設定)"));
    }

    #[test]
    fn test_last_minute_change_labels_each_kind() {
        let member = Member::new("U1", "Taro");
        for (title, label) in [("#event BBQ", "*イベント*"), ("Dinner", "*予定*"), ("#練習", "*練習*")] {
            let event = Event::new("ev", title, start(), start());
            let text = last_minute_rsvp_change(
                &ctx(),
                &member,
                &event,
                ParticipationType::Join,
                ParticipationType::Absent,
            )
            .rendered();
            assert!(text.contains(label), "{title}");
        }
    }

    #[test]
    fn test_bring_reminder_marks_chargeable_items() {
        let event = Event::new("ev", "#練習", start(), start() + Duration::hours(3));
        let items = vec![
            TrackedEquipment::new(
                Equipment {
                    id: 1,
                    ..Equipment::new("Video camera").for_practice()
                },
                vec![record_custody(1, "U1", start() - Duration::days(1), "")],
            ),
            TrackedEquipment::new(
                Equipment {
                    id: 2,
                    ..Equipment::new("Cones").for_practice()
                },
                vec![record_custody(2, "U1", start() - Duration::days(1), "")],
            ),
        ];
        let p = upsert(
            Participations::new(),
            "U1",
            Participation {
                kind: ParticipationType::Join,
                ..Default::default()
            },
        );
        let msg = equipment_bring_reminder(&plan(&event, &items, &p));
        let text = msg.rendered();
        assert!(text.contains("<@U1>"));
        assert!(text.contains(":electric_plug::zap: _Video camera_"));
        assert!(text.contains("_Cones_"));
        assert!(!text.contains(":electric_plug::zap: _Cones_"));
    }

    #[test]
    fn test_rsvp_reminder_skips_bots_and_deleted() {
        let event = Event::new("ev", "#練習", start(), start());
        let mut bot = Member::new("B", "bot");
        bot.is_bot = true;
        let summary = RsvpSummary {
            unanswered: vec![Member::new("U1", "A"), bot],
            ..Default::default()
        };
        let text = rsvp_reminder(&ctx(), &event, &summary).rendered();
        assert!(text.contains("<@U1>"));
        assert!(!text.contains("<@B>"));
        assert!(text.contains("https://help.example.com"));
    }

    #[test]
    fn test_reminders_without_mentions_have_no_empty_section() {
        let event = Event::new("ev1", "#練習", start(), start());
        let mut bot = Member::new("B", "bot");
        bot.is_bot = true;
        let gone = Member::new("U9", "Gone").with_status(crate::member::MemberStatus::Deleted);

        let summary = RsvpSummary {
            unanswered: vec![bot.clone(), gone.clone()],
            ..Default::default()
        };
        let report = FinalCallReport {
            by_role: BTreeMap::new(),
            unanswered: vec![bot, gone],
        };
        for msg in [
            rsvp_reminder(&ctx(), &event, &summary),
            final_call(&ctx(), &event, &[], &report),
        ] {
            assert!(!msg.rendered().contains("<@"));
            for block in &msg.blocks {
                if let Block::Section { text: Some(text), .. } = block {
                    assert!(!text.as_str().trim().is_empty());
                }
            }
        }
    }

    #[test]
    fn test_conditioning_check_links_form_with_query() {
        let event = Event::new("ev1", "#練習 午前", start(), start());
        let msg = conditioning_check(&ctx(), &event, "before", "ol & dl").unwrap();
        let text = msg.rendered();
        assert!(text.starts_with("*【運動前】* "));
        assert!(text.contains("*【OL & DL】*"));
        assert!(text.contains("#練習 午前"));
        let Some(Block::Actions { elements }) = msg.blocks.last() else {
            panic!("expected a button block");
        };
        assert_eq!(
            elements[0].url,
            "https://hub.example.com/redirect/conditioning-form?label=before&position=ol+%26+dl"
        );

        let other = conditioning_check(&ctx(), &event, "weekly", "qb").unwrap();
        assert!(other.text.starts_with("コンディショニング"));
    }

    #[test]
    fn test_final_call_lists_names_or_placeholder() {
        let event = Event::new("ev1", "#試合", start(), start());
        let roles = vec!["qb".to_string(), "ol".to_string()];
        let mut by_role = BTreeMap::new();
        by_role.insert(
            "qb".to_string(),
            vec![
                Participation {
                    name: "Taro".into(),
                    ..Default::default()
                },
                Participation {
                    name: "Jiro".into(),
                    ..Default::default()
                },
            ],
        );
        by_role.insert("ol".to_string(), vec![]);
        let report = FinalCallReport {
            by_role,
            unanswered: vec![],
        };
        let msg = final_call(&ctx(), &event, &roles, &report);
        let text = msg.rendered();
        assert!(text.contains("https://hub.example.com/events/ev1"));
        assert!(text.contains("Taro,  Jiro"));
        assert!(text.contains("*QB*"));
        assert!(text.contains("「ol」や「OL」"));
    }

    #[test]
    fn test_unreported_scan_lists_both_kinds() {
        let event = Event::new("ev", "#練習", start(), start() + Duration::hours(2));
        let scan = UnreportedScan {
            never_reported: vec![Equipment::new("Tent")],
            unreported: vec![TrackedEquipment::new(
                Equipment {
                    id: 7,
                    ..Equipment::new("Bag")
                },
                vec![],
            )],
            event_end: event.end_time,
        };
        let text = unreported_scan(&ctx(), &event, &scan).rendered();
        assert!(text.contains("・Tent [報告ゼロ]"));
        assert!(text.contains("・<https://hub.example.com/equips/7|Bag>"));
        assert!(text.contains("2025/06/07"));
    }

    #[test]
    fn test_custody_summary_when_all_is_well() {
        let summary = CustodySummary {
            unmanaged: vec![],
            not_updated: vec![],
            since: start(),
        };
        let text = custody_summary(&ctx(), &summary).rendered();
        assert!(text.contains("すべての備品の所在が確認できています。"));
    }
}
