use mineshaft_core::{BuffKind, Currency, TechNode, TechTrait, UnitKey, YieldTotals};
use mineshaft_system_modifiers::{apply_buffs, ModifierPipeline};

fn totals(entries: &[(Currency, f32)]) -> YieldTotals {
    entries.iter().copied().collect()
}

#[test]
fn buffs_apply_sequentially_in_list_order() {
    let mut yields = totals(&[(Currency::Stone, 10.0), (Currency::Gold, 5.0)]);
    let buffs = ["buff_stone", "buff_gold", "buff_gold2"]
        .into_iter()
        .map(|key| BuffKind::from_key(key).expect("known buff"))
        .collect::<Vec<_>>();

    apply_buffs(&buffs, &mut yields);

    assert_eq!(yields, totals(&[(Currency::Stone, 20.0), (Currency::Gold, 30.0)]));
}

#[test]
fn buff_order_changes_the_result() {
    let mut multiplied_first = totals(&[(Currency::Gold, 5.0)]);
    apply_buffs(
        &[BuffKind::GoldMultiplier, BuffKind::GoldOutput],
        &mut multiplied_first,
    );

    let mut bonus_first = totals(&[(Currency::Gold, 5.0)]);
    apply_buffs(
        &[BuffKind::GoldOutput, BuffKind::GoldMultiplier],
        &mut bonus_first,
    );

    assert_eq!(multiplied_first.get(&Currency::Gold), Some(&20.0));
    assert_eq!(bonus_first.get(&Currency::Gold), Some(&30.0));
}

#[test]
fn efficiency_scales_every_currency_after_buffs() {
    let unit = UnitKey::new("mine");
    let tech = [TechNode::new(TechTrait::Efficient, unit.clone(), 0.5)];
    let pipeline = ModifierPipeline::for_unit(&[BuffKind::CopperOutput], &tech, &unit);
    assert_eq!(pipeline.efficiency(), 0.5);

    let mut yields = totals(&[(Currency::Stone, 10.0)]);
    pipeline.apply(&mut yields);

    assert_eq!(
        yields,
        totals(&[(Currency::Stone, 15.0), (Currency::Copper, 37.5)])
    );
}

#[test]
fn empty_pipeline_is_the_identity() {
    let pipeline = ModifierPipeline::for_unit(&[], &[], &UnitKey::new("mine"));
    let mut yields = totals(&[(Currency::Iron, -4.0), (Currency::Gold, 2.5)]);
    let before = yields.clone();
    pipeline.apply(&mut yields);
    assert_eq!(yields, before);
}
