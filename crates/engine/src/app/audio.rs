use tracing::debug;

/// Named fire-and-forget sound cues. The mixer behind an [`AudioSink`] decides
/// what each one sounds like.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AudioCue {
    AttackBasic,
    AttackRanged,
    CollectItem,
    ShieldActivate,
    UpgradeSelect,
    CharacterSwitch,
    EnemyHit,
    EnemyDeath,
    PlayerHurt,
    PlayerDeath,
    Revive,
    BossSpell,
    BossSummon,
    Pause,
    Victory,
    GameOver,
}

impl AudioCue {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::AttackBasic => "attack_basic",
            Self::AttackRanged => "attack_ranged",
            Self::CollectItem => "collect_item",
            Self::ShieldActivate => "shield_activate",
            Self::UpgradeSelect => "upgrade_select",
            Self::CharacterSwitch => "character_switch",
            Self::EnemyHit => "enemy_hit",
            Self::EnemyDeath => "enemy_death",
            Self::PlayerHurt => "player_hurt",
            Self::PlayerDeath => "player_death",
            Self::Revive => "revive",
            Self::BossSpell => "boss_spell",
            Self::BossSummon => "boss_summon",
            Self::Pause => "pause",
            Self::Victory => "victory",
            Self::GameOver => "game_over",
        }
    }
}

pub trait AudioSink {
    /// Must return promptly; the loop calls this between ticks.
    fn play(&mut self, cue: AudioCue);
}

/// Default sink: records cues in the log instead of producing sound.
#[derive(Debug, Default)]
pub struct TracingAudioSink {
    played: u64,
}

impl TracingAudioSink {
    pub fn played(&self) -> u64 {
        self.played
    }
}

impl AudioSink for TracingAudioSink {
    fn play(&mut self, cue: AudioCue) {
        self.played = self.played.saturating_add(1);
        debug!(cue = cue.as_str(), "audio_cue");
    }
}
